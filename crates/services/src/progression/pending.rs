use chrono::{DateTime, Utc};
use course_core::McqResult;
use course_core::model::{ChapterId, LessonId, UserId};
use storage::repository::{ProgressStore, StorageError};

/// A progress write that was applied locally but not yet acknowledged by the store.
///
/// Replaying is safe in any order: the store merges lesson completions as a set
/// union and MCQ passes as a one-way flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    LessonCompleted {
        user: UserId,
        chapter: ChapterId,
        lesson: LessonId,
        at: DateTime<Utc>,
    },
    McqResult {
        user: UserId,
        result: McqResult,
        at: DateTime<Utc>,
    },
}

impl PendingWrite {
    #[must_use]
    pub fn user(&self) -> UserId {
        match self {
            PendingWrite::LessonCompleted { user, .. } | PendingWrite::McqResult { user, .. } => {
                *user
            }
        }
    }

    #[must_use]
    pub fn chapter(&self) -> ChapterId {
        match self {
            PendingWrite::LessonCompleted { chapter, .. } => *chapter,
            PendingWrite::McqResult { result, .. } => result.chapter_id,
        }
    }

    pub(crate) async fn send(&self, store: &dyn ProgressStore) -> Result<(), StorageError> {
        match self {
            PendingWrite::LessonCompleted {
                user,
                chapter,
                lesson,
                at,
            } => {
                store
                    .record_lesson_completed(*user, *chapter, *lesson, *at)
                    .await
            }
            PendingWrite::McqResult { user, result, at } => {
                store.record_mcq_result(*user, result, *at).await
            }
        }
    }
}
