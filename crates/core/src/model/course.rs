use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{ChapterId, CourseId, LessonId, QuestionId};
use crate::model::lesson::Lesson;
use crate::model::mcq::McqQuestion;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Data-integrity violations in course structure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("chapter title cannot be empty")]
    EmptyChapterTitle,

    #[error("chapter {0} has order 0; orders start at 1")]
    InvalidChapterOrder(ChapterId),

    #[error("chapter {chapter} belongs to course {found}, expected {expected}")]
    ForeignChapter {
        chapter: ChapterId,
        expected: CourseId,
        found: CourseId,
    },

    #[error("lesson {lesson} does not belong to chapter {chapter}")]
    ForeignLesson { chapter: ChapterId, lesson: LessonId },

    #[error("question in chapter {0} belongs to another chapter")]
    ForeignQuestion(ChapterId),

    #[error("duplicate chapter id {0}")]
    DuplicateChapterId(ChapterId),

    #[error("duplicate lesson id {0}")]
    DuplicateLessonId(LessonId),

    #[error("duplicate question id {0}")]
    DuplicateQuestionId(QuestionId),

    #[error("duplicate lesson order {order} in chapter {chapter}")]
    DuplicateLessonOrder { chapter: ChapterId, order: u32 },

    #[error("duplicate chapter order {0}")]
    DuplicateChapterOrder(u32),

    #[error("chapter orders must be contiguous: expected {expected}, found {found}")]
    ChapterOrderGap { expected: u32, found: u32 },
}

//
// ─── CHAPTER ───────────────────────────────────────────────────────────────────
//

/// An ordered group of lessons closed by an optional MCQ assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    id: ChapterId,
    course_id: CourseId,
    order: u32,
    title: String,
    lessons: Vec<Lesson>,
    questions: Vec<McqQuestion>,
}

impl Chapter {
    /// Creates a chapter. Lessons are stored sorted by their `order`.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the title is blank, `order` is zero, or a lesson or
    /// question belongs to another chapter, or lesson ids/orders repeat.
    pub fn new(
        id: ChapterId,
        course_id: CourseId,
        order: u32,
        title: impl Into<String>,
        mut lessons: Vec<Lesson>,
        questions: Vec<McqQuestion>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyChapterTitle);
        }
        if order == 0 {
            return Err(CourseError::InvalidChapterOrder(id));
        }

        let mut lesson_ids = HashSet::with_capacity(lessons.len());
        let mut lesson_orders = HashSet::with_capacity(lessons.len());
        for lesson in &lessons {
            if lesson.chapter_id() != id {
                return Err(CourseError::ForeignLesson {
                    chapter: id,
                    lesson: lesson.id(),
                });
            }
            if !lesson_ids.insert(lesson.id()) {
                return Err(CourseError::DuplicateLessonId(lesson.id()));
            }
            if !lesson_orders.insert(lesson.order()) {
                return Err(CourseError::DuplicateLessonOrder {
                    chapter: id,
                    order: lesson.order(),
                });
            }
        }
        if questions.iter().any(|q| q.chapter_id() != id) {
            return Err(CourseError::ForeignQuestion(id));
        }

        lessons.sort_by_key(Lesson::order);

        Ok(Self {
            id,
            course_id,
            order,
            title: title.trim().to_owned(),
            lessons,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Lessons in ascending `order`.
    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn questions(&self) -> &[McqQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn has_mcq(&self) -> bool {
        !self.questions.is_empty()
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id() == id)
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A published course: chapters ordered `1..=n` with no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    id: CourseId,
    title: String,
    chapters: Vec<Chapter>,
}

impl Course {
    /// Creates a course, sorting chapters by `order`.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the title is blank, a chapter belongs to another
    /// course, ids repeat, or chapter orders are not exactly `1..=n`.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        mut chapters: Vec<Chapter>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        let mut chapter_ids = HashSet::with_capacity(chapters.len());
        let mut lesson_ids = HashSet::new();
        let mut question_ids = HashSet::new();
        for chapter in &chapters {
            if chapter.course_id() != id {
                return Err(CourseError::ForeignChapter {
                    chapter: chapter.id(),
                    expected: id,
                    found: chapter.course_id(),
                });
            }
            if !chapter_ids.insert(chapter.id()) {
                return Err(CourseError::DuplicateChapterId(chapter.id()));
            }
            for lesson in chapter.lessons() {
                if !lesson_ids.insert(lesson.id()) {
                    return Err(CourseError::DuplicateLessonId(lesson.id()));
                }
            }
            for question in chapter.questions() {
                if !question_ids.insert(question.id()) {
                    return Err(CourseError::DuplicateQuestionId(question.id()));
                }
            }
        }

        chapters.sort_by_key(Chapter::order);
        validate_chapter_order(&chapters)?;

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            chapters,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Chapters in ascending `order`.
    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    #[must_use]
    pub fn chapter(&self, id: ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == id)
    }
}

/// Checks that `chapters`, already sorted by `order`, carry exactly `1..=n`.
///
/// # Errors
///
/// Returns `CourseError::DuplicateChapterOrder` or `CourseError::ChapterOrderGap`.
pub fn validate_chapter_order(chapters: &[Chapter]) -> Result<(), CourseError> {
    let mut expected = 1_u32;
    for chapter in chapters {
        let found = chapter.order();
        if found < expected {
            return Err(CourseError::DuplicateChapterOrder(found));
        }
        if found != expected {
            return Err(CourseError::ChapterOrderGap { expected, found });
        }
        expected += 1;
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
