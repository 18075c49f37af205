use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::course::Chapter;
use crate::model::ids::{ChapterId, CourseId, LessonId, UserId};

//
// ─── CHAPTER PROGRESS ──────────────────────────────────────────────────────────
//

/// A learner's progress through one chapter.
///
/// Every mutator only moves toward "more complete": lessons are never removed
/// from the completed set and `mcq_passed` never flips back to false. Two
/// copies of the same record can therefore be combined with [`merge`] in any
/// order and converge on the same state.
///
/// [`merge`]: UserChapterProgress::merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChapterProgress {
    chapter_id: ChapterId,
    completed_lesson_ids: BTreeSet<LessonId>,
    mcq_attempted: bool,
    mcq_passed: bool,
    passed_at: Option<DateTime<Utc>>,
}

impl UserChapterProgress {
    #[must_use]
    pub fn new(chapter_id: ChapterId) -> Self {
        Self {
            chapter_id,
            completed_lesson_ids: BTreeSet::new(),
            mcq_attempted: false,
            mcq_passed: false,
            passed_at: None,
        }
    }

    /// Rebuilds a record from persisted fields.
    ///
    /// A passed MCQ implies an attempted one, so `mcq_attempted` is forced on
    /// when `mcq_passed` is set.
    #[must_use]
    pub fn from_persisted(
        chapter_id: ChapterId,
        completed_lesson_ids: impl IntoIterator<Item = LessonId>,
        mcq_attempted: bool,
        mcq_passed: bool,
        passed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            chapter_id,
            completed_lesson_ids: completed_lesson_ids.into_iter().collect(),
            mcq_attempted: mcq_attempted || mcq_passed,
            mcq_passed,
            passed_at: if mcq_passed { passed_at } else { None },
        }
    }

    #[must_use]
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    #[must_use]
    pub fn completed_lesson_ids(&self) -> &BTreeSet<LessonId> {
        &self.completed_lesson_ids
    }

    #[must_use]
    pub fn mcq_attempted(&self) -> bool {
        self.mcq_attempted
    }

    #[must_use]
    pub fn mcq_passed(&self) -> bool {
        self.mcq_passed
    }

    #[must_use]
    pub fn passed_at(&self) -> Option<DateTime<Utc>> {
        self.passed_at
    }

    #[must_use]
    pub fn has_completed(&self, lesson: LessonId) -> bool {
        self.completed_lesson_ids.contains(&lesson)
    }

    /// Returns true when every lesson of `chapter` is in the completed set.
    #[must_use]
    pub fn all_lessons_done(&self, chapter: &Chapter) -> bool {
        chapter
            .lessons()
            .iter()
            .all(|l| self.completed_lesson_ids.contains(&l.id()))
    }

    /// Adds `lesson` to the completed set. Returns false if it was already there.
    pub fn complete_lesson(&mut self, lesson: LessonId) -> bool {
        self.completed_lesson_ids.insert(lesson)
    }

    /// Records a finished (failed or passed) MCQ run. Returns false if already set.
    pub fn mark_attempted(&mut self) -> bool {
        let changed = !self.mcq_attempted;
        self.mcq_attempted = true;
        changed
    }

    /// Flips `mcq_passed` on and stamps `passed_at`.
    ///
    /// The first pass timestamp is kept; later calls return false and change nothing.
    pub fn mark_passed(&mut self, at: DateTime<Utc>) -> bool {
        self.mcq_attempted = true;
        if self.mcq_passed {
            return false;
        }
        self.mcq_passed = true;
        self.passed_at = Some(at);
        true
    }

    /// Folds `other` into `self`: set union on lessons, boolean OR on flags and
    /// the earliest known `passed_at`.
    pub fn merge(&mut self, other: &UserChapterProgress) {
        debug_assert_eq!(self.chapter_id, other.chapter_id);
        self.completed_lesson_ids
            .extend(other.completed_lesson_ids.iter().copied());
        self.mcq_attempted |= other.mcq_attempted;
        self.mcq_passed |= other.mcq_passed;
        self.passed_at = match (self.passed_at, other.passed_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Progress of one learner across the chapters of one course.
///
/// Missing chapters read as "nothing completed yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    user_id: UserId,
    course_id: CourseId,
    chapters: BTreeMap<ChapterId, UserChapterProgress>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            chapters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn from_records(
        user_id: UserId,
        course_id: CourseId,
        records: impl IntoIterator<Item = UserChapterProgress>,
    ) -> Self {
        let mut snapshot = Self::new(user_id, course_id);
        for record in records {
            snapshot.merge_chapter(&record);
        }
        snapshot
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn chapter(&self, id: ChapterId) -> Option<&UserChapterProgress> {
        self.chapters.get(&id)
    }

    /// Returns the record for `id`, creating an empty one on first use.
    pub fn chapter_mut(&mut self, id: ChapterId) -> &mut UserChapterProgress {
        self.chapters
            .entry(id)
            .or_insert_with(|| UserChapterProgress::new(id))
    }

    pub fn chapters(&self) -> impl Iterator<Item = &UserChapterProgress> {
        self.chapters.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    #[must_use]
    pub fn mcq_passed(&self, id: ChapterId) -> bool {
        self.chapter(id).is_some_and(UserChapterProgress::mcq_passed)
    }

    #[must_use]
    pub fn lesson_completed(&self, chapter: ChapterId, lesson: LessonId) -> bool {
        self.chapter(chapter).is_some_and(|p| p.has_completed(lesson))
    }

    pub fn merge_chapter(&mut self, record: &UserChapterProgress) {
        self.chapter_mut(record.chapter_id()).merge(record);
    }

    /// Folds every chapter record of `other` into `self`.
    pub fn merge(&mut self, other: &ProgressSnapshot) {
        for record in other.chapters.values() {
            self.merge_chapter(record);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
