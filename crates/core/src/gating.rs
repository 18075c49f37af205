//! Chapter gating: derives per-chapter `locked`/`completed` flags from a course
//! structure and a learner's progress snapshot.
//!
//! Chapter `k > 1` is locked exactly when chapter `k - 1` is not completed. A
//! chapter is completed when all its lessons are done and, if it has questions,
//! its MCQ has been passed. Because progress only ever grows, a chapter that has
//! been unlocked stays unlocked.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Chapter, ChapterId, Course, CourseError, LessonId, ProgressSnapshot};
use crate::model::validate_chapter_order;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected access to gated content.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("chapter {0} is locked")]
    ChapterLocked(ChapterId),

    #[error("chapter {0} is not part of this course")]
    UnknownChapter(ChapterId),

    #[error("lesson {lesson} is not part of chapter {chapter}")]
    UnknownLesson { chapter: ChapterId, lesson: LessonId },
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Derived gating state of a single chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChapterStatus {
    pub locked: bool,
    pub completed: bool,
}

/// Result of one gating pass over a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatingReport {
    order: Vec<ChapterId>,
    statuses: HashMap<ChapterId, ChapterStatus>,
    preview_lessons: HashMap<ChapterId, Vec<LessonId>>,
    lessons: HashMap<ChapterId, Vec<LessonId>>,
}

impl GatingReport {
    #[must_use]
    pub fn status(&self, chapter: ChapterId) -> Option<ChapterStatus> {
        self.statuses.get(&chapter).copied()
    }

    /// Statuses in chapter order.
    pub fn iter(&self) -> impl Iterator<Item = (ChapterId, ChapterStatus)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.statuses.get(id).map(|s| (*id, *s)))
    }

    #[must_use]
    pub fn is_locked(&self, chapter: ChapterId) -> bool {
        self.status(chapter).is_none_or(|s| s.locked)
    }

    #[must_use]
    pub fn is_completed(&self, chapter: ChapterId) -> bool {
        self.status(chapter).is_some_and(|s| s.completed)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.statuses.values().filter(|s| s.completed).count()
    }

    #[must_use]
    pub fn chapter_count(&self) -> usize {
        self.order.len()
    }

    /// True once every chapter is completed. An empty course is never completed.
    #[must_use]
    pub fn course_completed(&self) -> bool {
        !self.order.is_empty() && self.completed_count() == self.order.len()
    }

    /// Whether `lesson` in `chapter` may be opened: the chapter is unlocked or
    /// the lesson is a preview.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::ChapterLocked` when the chapter is locked and the
    /// lesson is not a preview, or `UnknownChapter`/`UnknownLesson` for ids
    /// outside the evaluated course.
    pub fn check_lesson_access(
        &self,
        chapter: ChapterId,
        lesson: LessonId,
    ) -> Result<(), AccessError> {
        let status = self
            .status(chapter)
            .ok_or(AccessError::UnknownChapter(chapter))?;
        let known = self
            .lessons
            .get(&chapter)
            .is_some_and(|ids| ids.contains(&lesson));
        if !known {
            return Err(AccessError::UnknownLesson { chapter, lesson });
        }
        if !status.locked {
            return Ok(());
        }
        let preview = self
            .preview_lessons
            .get(&chapter)
            .is_some_and(|ids| ids.contains(&lesson));
        if preview {
            Ok(())
        } else {
            Err(AccessError::ChapterLocked(chapter))
        }
    }

    /// Whether the chapter MCQ may be started. Previews never cover the MCQ.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::ChapterLocked` or `AccessError::UnknownChapter`.
    pub fn check_mcq_access(&self, chapter: ChapterId) -> Result<ChapterStatus, AccessError> {
        let status = self
            .status(chapter)
            .ok_or(AccessError::UnknownChapter(chapter))?;
        if status.locked {
            return Err(AccessError::ChapterLocked(chapter));
        }
        Ok(status)
    }
}

//
// ─── EVALUATION ────────────────────────────────────────────────────────────────
//

/// Evaluates gating for a validated course.
///
/// Pure and deterministic: the same inputs always give the same report.
#[must_use]
pub fn evaluate(course: &Course, progress: &ProgressSnapshot) -> GatingReport {
    evaluate_sorted(course.chapters(), progress)
}

/// Evaluates gating for a raw chapter list.
///
/// Chapters are sorted by `order` first; duplicate or non-contiguous orders are
/// treated as a data-integrity error instead of being evaluated.
///
/// # Errors
///
/// Returns `CourseError::DuplicateChapterOrder` or `CourseError::ChapterOrderGap`.
pub fn evaluate_chapters(
    chapters: &[Chapter],
    progress: &ProgressSnapshot,
) -> Result<GatingReport, CourseError> {
    let mut sorted: Vec<Chapter> = chapters.to_vec();
    sorted.sort_by_key(Chapter::order);
    validate_chapter_order(&sorted)?;
    Ok(evaluate_sorted(&sorted, progress))
}

/// Returns whether `chapter` is completed under `progress`, ignoring locks.
#[must_use]
pub fn chapter_completed(chapter: &Chapter, progress: &ProgressSnapshot) -> bool {
    match progress.chapter(chapter.id()) {
        Some(p) => p.all_lessons_done(chapter) && (!chapter.has_mcq() || p.mcq_passed()),
        // No record yet: only a chapter with nothing to do counts as done.
        None => chapter.lessons().is_empty() && !chapter.has_mcq(),
    }
}

fn evaluate_sorted(chapters: &[Chapter], progress: &ProgressSnapshot) -> GatingReport {
    let mut order = Vec::with_capacity(chapters.len());
    let mut statuses = HashMap::with_capacity(chapters.len());
    let mut preview_lessons = HashMap::with_capacity(chapters.len());
    let mut lessons = HashMap::with_capacity(chapters.len());

    let mut previous_completed = true;
    for chapter in chapters {
        let completed = chapter_completed(chapter, progress);
        let status = ChapterStatus {
            locked: !previous_completed,
            completed,
        };
        previous_completed = completed;

        order.push(chapter.id());
        statuses.insert(chapter.id(), status);
        preview_lessons.insert(
            chapter.id(),
            chapter
                .lessons()
                .iter()
                .filter(|l| l.is_preview())
                .map(|l| l.id())
                .collect(),
        );
        lessons.insert(
            chapter.id(),
            chapter.lessons().iter().map(|l| l.id()).collect(),
        );
    }

    GatingReport {
        order,
        statuses,
        preview_lessons,
        lessons,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CourseId, Lesson, LessonContent, McqQuestion, QuestionId, UserChapterProgress, UserId,
    };
    use crate::time::fixed_now;

    fn lesson(id: u64, chapter: u64, order: u32, preview: bool) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            ChapterId::new(chapter),
            order,
            format!("Lesson {id}"),
            LessonContent::text("body").unwrap(),
            preview,
        )
        .unwrap()
    }

    fn question(id: u64, chapter: u64) -> McqQuestion {
        McqQuestion::new(
            QuestionId::new(id),
            ChapterId::new(chapter),
            format!("Question {id}"),
            vec!["a".into(), "b".into()],
            0,
        )
        .unwrap()
    }

    fn chapter(id: u64, order: u32, lessons: Vec<Lesson>, questions: Vec<McqQuestion>) -> Chapter {
        Chapter::new(
            ChapterId::new(id),
            CourseId::new(1),
            order,
            format!("Chapter {id}"),
            lessons,
            questions,
        )
        .unwrap()
    }

    /// Chapter 1: lessons 11, 12 and two questions. Chapter 2: lesson 21, no MCQ.
    /// Chapter 3: lesson 31 (preview) and 32.
    fn course() -> Course {
        Course::new(
            CourseId::new(1),
            "Course",
            vec![
                chapter(
                    1,
                    1,
                    vec![lesson(11, 1, 1, false), lesson(12, 1, 2, false)],
                    vec![question(1, 1), question(2, 1)],
                ),
                chapter(2, 2, vec![lesson(21, 2, 1, false)], Vec::new()),
                chapter(
                    3,
                    3,
                    vec![lesson(31, 3, 1, true), lesson(32, 3, 2, false)],
                    Vec::new(),
                ),
            ],
        )
        .unwrap()
    }

    fn empty_progress() -> ProgressSnapshot {
        ProgressSnapshot::new(UserId::new(1), CourseId::new(1))
    }

    #[test]
    fn first_chapter_is_never_locked() {
        let report = evaluate(&course(), &empty_progress());
        let first = report.status(ChapterId::new(1)).unwrap();
        assert!(!first.locked);
        assert!(!first.completed);
        assert!(report.is_locked(ChapterId::new(2)));
        assert!(report.is_locked(ChapterId::new(3)));
    }

    #[test]
    fn lessons_alone_do_not_complete_a_chapter_with_mcq() {
        let mut progress = empty_progress();
        let ch1 = progress.chapter_mut(ChapterId::new(1));
        ch1.complete_lesson(LessonId::new(11));
        ch1.complete_lesson(LessonId::new(12));

        let report = evaluate(&course(), &progress);
        assert!(!report.is_completed(ChapterId::new(1)));
        assert!(report.is_locked(ChapterId::new(2)));
    }

    #[test]
    fn passing_mcq_unlocks_next_chapter() {
        let mut progress = empty_progress();
        let ch1 = progress.chapter_mut(ChapterId::new(1));
        ch1.complete_lesson(LessonId::new(11));
        ch1.complete_lesson(LessonId::new(12));
        ch1.mark_passed(fixed_now());

        let report = evaluate(&course(), &progress);
        assert!(report.is_completed(ChapterId::new(1)));
        assert!(!report.is_locked(ChapterId::new(2)));
        assert!(report.is_locked(ChapterId::new(3)));
    }

    #[test]
    fn mcq_pass_without_lessons_is_not_completion() {
        let mut progress = empty_progress();
        progress.chapter_mut(ChapterId::new(1)).mark_passed(fixed_now());
        let report = evaluate(&course(), &progress);
        assert!(!report.is_completed(ChapterId::new(1)));
    }

    #[test]
    fn chapter_without_mcq_completes_on_lessons() {
        let mut progress = empty_progress();
        progress
            .chapter_mut(ChapterId::new(2))
            .complete_lesson(LessonId::new(21));
        let report = evaluate(&course(), &progress);
        // Completion is independent of lock state.
        assert!(report.is_completed(ChapterId::new(2)));
        assert!(report.is_locked(ChapterId::new(2)));
        // Chapter 3 depends on chapter 2 being completed, not on chapter 1.
        assert!(!report.is_locked(ChapterId::new(3)));
    }

    #[test]
    fn full_progress_completes_course() {
        let mut progress = empty_progress();
        for (ch, lessons) in [(1, vec![11, 12]), (2, vec![21]), (3, vec![31, 32])] {
            let rec = progress.chapter_mut(ChapterId::new(ch));
            for l in lessons {
                rec.complete_lesson(LessonId::new(l));
            }
        }
        progress.chapter_mut(ChapterId::new(1)).mark_passed(fixed_now());

        let report = evaluate(&course(), &progress);
        assert!(report.course_completed());
        assert_eq!(report.completed_count(), 3);
        assert!(report.iter().all(|(_, s)| !s.locked));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let mut progress = empty_progress();
        progress
            .chapter_mut(ChapterId::new(1))
            .complete_lesson(LessonId::new(11));
        let c = course();
        assert_eq!(evaluate(&c, &progress), evaluate(&c, &progress));
    }

    #[test]
    fn iter_follows_chapter_order() {
        let report = evaluate(&course(), &empty_progress());
        let ids: Vec<_> = report.iter().map(|(id, _)| id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn preview_lesson_is_reachable_in_locked_chapter() {
        let report = evaluate(&course(), &empty_progress());
        assert_eq!(
            report.check_lesson_access(ChapterId::new(3), LessonId::new(31)),
            Ok(())
        );
        assert_eq!(
            report.check_lesson_access(ChapterId::new(3), LessonId::new(32)),
            Err(AccessError::ChapterLocked(ChapterId::new(3)))
        );
    }

    #[test]
    fn access_checks_reject_unknown_ids() {
        let report = evaluate(&course(), &empty_progress());
        assert_eq!(
            report.check_lesson_access(ChapterId::new(1), LessonId::new(21)),
            Err(AccessError::UnknownLesson {
                chapter: ChapterId::new(1),
                lesson: LessonId::new(21)
            })
        );
        assert_eq!(
            report.check_mcq_access(ChapterId::new(9)),
            Err(AccessError::UnknownChapter(ChapterId::new(9)))
        );
    }

    #[test]
    fn mcq_access_requires_unlocked_chapter() {
        let report = evaluate(&course(), &empty_progress());
        assert!(report.check_mcq_access(ChapterId::new(1)).is_ok());
        assert_eq!(
            report.check_mcq_access(ChapterId::new(2)),
            Err(AccessError::ChapterLocked(ChapterId::new(2)))
        );
    }

    #[test]
    fn evaluate_chapters_rejects_gaps() {
        let chapters = vec![
            chapter(1, 1, Vec::new(), Vec::new()),
            chapter(2, 3, Vec::new(), Vec::new()),
        ];
        let err = evaluate_chapters(&chapters, &empty_progress()).unwrap_err();
        assert_eq!(err, CourseError::ChapterOrderGap { expected: 2, found: 3 });
    }

    #[test]
    fn evaluate_chapters_sorts_input() {
        let chapters = vec![
            chapter(2, 2, vec![lesson(21, 2, 1, false)], Vec::new()),
            chapter(1, 1, Vec::new(), Vec::new()),
        ];
        let report = evaluate_chapters(&chapters, &empty_progress()).unwrap();
        // Chapter 1 has no content, so it is trivially completed.
        assert!(report.is_completed(ChapterId::new(1)));
        assert!(!report.is_locked(ChapterId::new(2)));
    }

    #[test]
    fn missing_record_counts_as_no_progress() {
        let mut progress = empty_progress();
        progress.merge_chapter(&UserChapterProgress::new(ChapterId::new(2)));
        let report = evaluate(&course(), &progress);
        assert!(!report.is_completed(ChapterId::new(1)));
        assert!(!report.is_completed(ChapterId::new(2)));
    }

    #[test]
    fn empty_course_is_not_completed() {
        let c = Course::new(CourseId::new(1), "Empty", Vec::new()).unwrap();
        assert!(!evaluate(&c, &empty_progress()).course_completed());
    }
}
