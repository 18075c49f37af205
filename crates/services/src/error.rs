//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{ChapterId, CourseId, LessonId};
use course_core::{AccessError, AttemptError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("course {0} not found")]
    UnknownCourse(CourseId),
    #[error("chapter {0} not found")]
    UnknownChapter(ChapterId),
    #[error("lesson {lesson} is not part of chapter {chapter}")]
    UnknownLesson { chapter: ChapterId, lesson: LessonId },
    /// Gated content was requested; rejected before any store call.
    #[error("chapter {0} is locked")]
    ChapterLocked(ChapterId),
    #[error(transparent)]
    Access(AccessError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    /// The local state advanced but the store did not record it; the write is
    /// queued for `ProgressionService::flush_pending`.
    #[error("progress was not persisted: {0}")]
    PersistenceFailure(#[source] StorageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<AccessError> for ProgressionError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::ChapterLocked(chapter) => ProgressionError::ChapterLocked(chapter),
            AccessError::UnknownChapter(chapter) => ProgressionError::UnknownChapter(chapter),
            AccessError::UnknownLesson { chapter, lesson } => {
                ProgressionError::UnknownLesson { chapter, lesson }
            }
            other => ProgressionError::Access(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
