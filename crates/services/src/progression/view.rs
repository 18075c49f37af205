use course_core::GatingReport;
use course_core::model::{Chapter, ChapterId, Course, CourseId, LessonId, ProgressSnapshot};
use serde::Serialize;

/// Read model handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseView {
    pub course_id: CourseId,
    pub title: String,
    pub chapters: Vec<ChapterView>,
    pub completed_chapters: usize,
    pub total_chapters: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterView {
    pub id: ChapterId,
    pub order: u32,
    pub title: String,
    pub locked: bool,
    pub completed: bool,
    pub mcq_attempted: bool,
    pub mcq_passed: bool,
    pub question_count: usize,
    pub lessons: Vec<LessonView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonView {
    pub id: LessonId,
    pub order: u32,
    pub title: String,
    pub is_preview: bool,
    pub completed: bool,
    /// The chapter is unlocked or the lesson is a preview.
    pub accessible: bool,
}

impl CourseView {
    pub(crate) fn build(course: &Course, progress: &ProgressSnapshot, report: &GatingReport) -> Self {
        let chapters: Vec<ChapterView> = course
            .chapters()
            .iter()
            .map(|chapter| ChapterView::build(chapter, progress, report))
            .collect();

        Self {
            course_id: course.id(),
            title: course.title().to_owned(),
            completed_chapters: report.completed_count(),
            total_chapters: report.chapter_count(),
            completed: report.course_completed(),
            chapters,
        }
    }

    #[must_use]
    pub fn chapter(&self, id: ChapterId) -> Option<&ChapterView> {
        self.chapters.iter().find(|c| c.id == id)
    }

    /// First chapter that is unlocked but not yet completed.
    #[must_use]
    pub fn current_chapter(&self) -> Option<&ChapterView> {
        self.chapters.iter().find(|c| !c.locked && !c.completed)
    }
}

impl ChapterView {
    pub(crate) fn build(chapter: &Chapter, progress: &ProgressSnapshot, report: &GatingReport) -> Self {
        let status = report.status(chapter.id());
        let locked = status.is_none_or(|s| s.locked);
        let record = progress.chapter(chapter.id());

        let lessons = chapter
            .lessons()
            .iter()
            .map(|lesson| LessonView {
                id: lesson.id(),
                order: lesson.order(),
                title: lesson.title().to_owned(),
                is_preview: lesson.is_preview(),
                completed: record.is_some_and(|r| r.has_completed(lesson.id())),
                accessible: !locked || lesson.is_preview(),
            })
            .collect();

        Self {
            id: chapter.id(),
            order: chapter.order(),
            title: chapter.title().to_owned(),
            locked,
            completed: status.is_some_and(|s| s.completed),
            mcq_attempted: record.is_some_and(|r| r.mcq_attempted()),
            mcq_passed: record.is_some_and(|r| r.mcq_passed()),
            question_count: chapter.questions().len(),
            lessons,
        }
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&LessonView> {
        self.lessons.iter().find(|l| l.id == id)
    }
}
