use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::McqResult;
use course_core::model::{
    Chapter, ChapterId, Course, CourseId, Lesson, LessonId, McqQuestion, ProgressSnapshot,
    QuestionId, UserChapterProgress, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read/write access to static course structure.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Persist or replace a course with all its chapters, lessons and questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a chapter, lesson or question id is
    /// already owned by another course, or another `StorageError` if the course
    /// cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure; a missing course is `Ok(None)`.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Resolve which course a chapter belongs to.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure; an unknown chapter is `Ok(None)`.
    async fn course_for_chapter(&self, id: ChapterId) -> Result<Option<CourseId>, StorageError>;
}

/// Durable per-learner progress.
///
/// Writes must merge monotonically: recording a lesson is a set insert and
/// recording an MCQ result can set `mcq_passed` but never clear it, whatever
/// order writes arrive in.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch every chapter record of `user` within `course`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be read.
    async fn course_progress(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<ProgressSnapshot, StorageError>;

    /// Add `lesson` to the completed set of `(user, chapter)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn record_lesson_completed(
        &self,
        user: UserId,
        chapter: ChapterId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Record a finished MCQ attempt. A passing result stamps `passed_at = at`
    /// unless an earlier pass is already stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn record_mcq_result(
        &self,
        user: UserId,
        result: &McqResult,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    progress: Arc<Mutex<HashMap<(UserId, ChapterId), UserChapterProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T>(
        &self,
        user: UserId,
        chapter: ChapterId,
        f: impl FnOnce(&mut UserChapterProgress) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard
            .entry((user, chapter))
            .or_insert_with(|| UserChapterProgress::new(chapter));
        Ok(f(record))
    }
}

fn shares_structure_ids(a: &Course, b: &Course) -> bool {
    let chapters: HashSet<ChapterId> = a.chapters().iter().map(Chapter::id).collect();
    let lessons: HashSet<LessonId> = a
        .chapters()
        .iter()
        .flat_map(|c| c.lessons().iter().map(Lesson::id))
        .collect();
    let questions: HashSet<QuestionId> = a
        .chapters()
        .iter()
        .flat_map(|c| c.questions().iter().map(McqQuestion::id))
        .collect();

    b.chapters().iter().any(|chapter| {
        chapters.contains(&chapter.id())
            || chapter.lessons().iter().any(|l| lessons.contains(&l.id()))
            || chapter.questions().iter().any(|q| questions.contains(&q.id()))
    })
}

#[async_trait]
impl CourseCatalog for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        // Chapter, lesson and question ids are global; commands address them
        // without a course id.
        let clashes = guard
            .values()
            .filter(|other| other.id() != course.id())
            .any(|other| shares_structure_ids(other, course));
        if clashes {
            return Err(StorageError::Conflict);
        }
        guard.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn course_for_chapter(&self, id: ChapterId) -> Result<Option<CourseId>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .find(|course| course.chapter(id).is_some())
            .map(Course::id))
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn course_progress(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<ProgressSnapshot, StorageError> {
        let chapter_ids: Vec<ChapterId> = {
            let guard = self
                .courses
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard
                .get(&course)
                .map(|c| c.chapters().iter().map(|ch| ch.id()).collect())
                .unwrap_or_default()
        };

        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let records = chapter_ids
            .into_iter()
            .filter_map(|chapter| guard.get(&(user, chapter)).cloned());
        Ok(ProgressSnapshot::from_records(user, course, records))
    }

    async fn record_lesson_completed(
        &self,
        user: UserId,
        chapter: ChapterId,
        lesson: LessonId,
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_record(user, chapter, |record| {
            record.complete_lesson(lesson);
        })
    }

    async fn record_mcq_result(
        &self,
        user: UserId,
        result: &McqResult,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_record(user, result.chapter_id, |record| {
            record.mark_attempted();
            if result.passed {
                record.mark_passed(at);
            }
        })
    }
}

/// Aggregates catalog and progress repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CourseCatalog>,
    pub progress: Arc<dyn ProgressStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let catalog: Arc<dyn CourseCatalog> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressStore> = Arc::new(repo);
        Self { catalog, progress }
    }
}
