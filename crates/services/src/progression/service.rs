use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use course_core::attempt::AttemptProgress;
use course_core::model::{ChapterId, Course, CourseId, LessonId, ProgressSnapshot, UserId};
use course_core::{AnswerOutcome, AttemptError, McqAttempt, McqResult, evaluate};
use storage::repository::{CourseCatalog, ProgressStore};
use tracing::{debug, info, warn};

use super::pending::PendingWrite;
use super::view::{ChapterView, CourseView};
use crate::Clock;
use crate::error::ProgressionError;

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Outcome of asking to start a chapter MCQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McqStart {
    Started(McqAttempt),
    /// The learner already passed; nothing was started and nothing changed.
    AlreadyPassed(ChapterView),
}

/// Result of answering one MCQ question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqAnswer {
    pub outcome: AnswerOutcome,
    pub progress: AttemptProgress,
    /// Refreshed course view, present once the attempt finished.
    pub view: Option<CourseView>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Course progression controller.
///
/// Keeps a local copy of each learner's progress. Every mutation is applied
/// locally first and then sent to the `ProgressStore`; if the store fails, the
/// local state still advances, the write is queued for [`flush_pending`], and
/// `ProgressionError::PersistenceFailure` is returned. Reads merge the store's
/// snapshot into the local one, so a stale copy on either side heals on the next
/// [`get_course_view`].
///
/// Gating is checked against the local snapshot before any store call, so a
/// locked chapter never produces a write.
///
/// [`flush_pending`]: ProgressionService::flush_pending
/// [`get_course_view`]: ProgressionService::get_course_view
pub struct ProgressionService {
    clock: Clock,
    catalog: Arc<dyn CourseCatalog>,
    store: Arc<dyn ProgressStore>,
    courses: Mutex<HashMap<CourseId, Arc<Course>>>,
    snapshots: Mutex<HashMap<(UserId, CourseId), ProgressSnapshot>>,
    pending: Mutex<Vec<PendingWrite>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProgressionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CourseCatalog>,
        store: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            clock,
            catalog,
            store,
            courses: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Full ordered chapter list with lock/completion flags and per-lesson state.
    ///
    /// Fetches the authoritative snapshot and merges it with local progress. If
    /// the store is unreachable but a local copy exists, the local copy is used.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCourse` if the catalog has no such course, or `Storage`
    /// if the store fails and nothing is cached.
    pub async fn get_course_view(
        &self,
        user: UserId,
        course_id: CourseId,
    ) -> Result<CourseView, ProgressionError> {
        let course = self.load_course(course_id).await?;

        let snapshot = match self.store.course_progress(user, course_id).await {
            Ok(remote) => self.merge_local(user, course_id, &remote),
            Err(err) => {
                let cached = lock(&self.snapshots).get(&(user, course_id)).cloned();
                match cached {
                    Some(local) => {
                        warn!(%user, course = %course_id, error = %err, "serving cached progress");
                        local
                    }
                    None => return Err(ProgressionError::Storage(err)),
                }
            }
        };

        let report = evaluate(&course, &snapshot);
        Ok(CourseView::build(&course, &snapshot, &report))
    }

    /// Marks `lesson` as completed.
    ///
    /// Viewing an already completed lesson changes nothing and sends nothing.
    ///
    /// # Errors
    ///
    /// - `ChapterLocked` if the chapter is locked and the lesson is not a preview.
    /// - `UnknownChapter` / `UnknownLesson` for ids outside the catalog.
    /// - `PersistenceFailure` if the store rejected the write (local state advanced).
    pub async fn on_lesson_viewed(
        &self,
        user: UserId,
        chapter: ChapterId,
        lesson: LessonId,
    ) -> Result<CourseView, ProgressionError> {
        let course = self.course_for_chapter(chapter).await?;
        let snapshot = self.local_snapshot(user, course.id()).await?;
        evaluate(&course, &snapshot).check_lesson_access(chapter, lesson)?;

        let (changed, snapshot) = self.apply_local(user, course.id(), |s| {
            s.chapter_mut(chapter).complete_lesson(lesson)
        });
        let report = evaluate(&course, &snapshot);

        if changed {
            info!(
                %user,
                %chapter,
                %lesson,
                chapter_completed = report.is_completed(chapter),
                "lesson completed"
            );
            self.persist(PendingWrite::LessonCompleted {
                user,
                chapter,
                lesson,
                at: self.clock.now(),
            })
            .await?;
        } else {
            debug!(%user, %chapter, %lesson, "lesson already completed");
        }

        Ok(CourseView::build(&course, &snapshot, &report))
    }

    /// Starts an MCQ attempt for `chapter`.
    ///
    /// # Errors
    ///
    /// - `ChapterLocked` if the chapter is locked.
    /// - `Attempt(NoQuestions)` if the chapter has no MCQ.
    pub async fn start_mcq(
        &self,
        user: UserId,
        chapter: ChapterId,
    ) -> Result<McqStart, ProgressionError> {
        let course = self.course_for_chapter(chapter).await?;
        let snapshot = self.local_snapshot(user, course.id()).await?;
        let report = evaluate(&course, &snapshot);
        let status = report.check_mcq_access(chapter)?;
        let definition = course
            .chapter(chapter)
            .ok_or(ProgressionError::UnknownChapter(chapter))?;

        match McqAttempt::start(definition, status, snapshot.chapter(chapter)) {
            Ok(attempt) => {
                debug!(%user, %chapter, questions = definition.questions().len(), "mcq started");
                Ok(McqStart::Started(attempt))
            }
            Err(AttemptError::AlreadyPassed(_)) => Ok(McqStart::AlreadyPassed(ChapterView::build(
                definition, &snapshot, &report,
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Answers the current question of `attempt` and, on the last question,
    /// hands the verdict to [`on_mcq_finished`](Self::on_mcq_finished).
    ///
    /// # Errors
    ///
    /// Returns `Attempt` errors from the engine, or any error of `on_mcq_finished`.
    pub async fn answer_mcq(
        &self,
        user: UserId,
        attempt: &mut McqAttempt,
        selected: usize,
    ) -> Result<McqAnswer, ProgressionError> {
        let outcome = attempt.answer(selected)?;
        let view = match outcome.result() {
            Some(result) => Some(self.on_mcq_finished(user, result).await?),
            None => None,
        };

        Ok(McqAnswer {
            outcome,
            progress: attempt.progress(),
            view,
        })
    }

    /// Applies a finished MCQ verdict.
    ///
    /// A pass flips `mcq_passed` and stamps `passed_at`. A failure still
    /// mutates progress: it sets `mcq_attempted` and sends the failed result
    /// to the store, but leaves `mcq_passed` and chapter completion untouched.
    /// Results for an already passed chapter change nothing and are not sent.
    ///
    /// # Errors
    ///
    /// - `ChapterLocked` if the chapter is locked.
    /// - `Attempt(NoQuestions)` if the chapter has no MCQ.
    /// - `PersistenceFailure` if the store rejected the write (local state advanced).
    pub async fn on_mcq_finished(
        &self,
        user: UserId,
        result: McqResult,
    ) -> Result<CourseView, ProgressionError> {
        let chapter = result.chapter_id;
        let course = self.course_for_chapter(chapter).await?;
        let snapshot = self.local_snapshot(user, course.id()).await?;
        evaluate(&course, &snapshot).check_mcq_access(chapter)?;
        let has_mcq = course.chapter(chapter).is_some_and(|c| c.has_mcq());
        if !has_mcq {
            return Err(AttemptError::NoQuestions(chapter).into());
        }

        let already_passed = snapshot.mcq_passed(chapter);
        let now = self.clock.now();
        let (_, snapshot) = self.apply_local(user, course.id(), |s| {
            let record = s.chapter_mut(chapter);
            if result.passed {
                record.mark_passed(now)
            } else {
                record.mark_attempted()
            }
        });
        let report = evaluate(&course, &snapshot);

        if already_passed {
            debug!(%user, %chapter, "mcq result ignored, chapter already passed");
        } else {
            info!(
                %user,
                %chapter,
                passed = result.passed,
                score = result.score,
                total = result.total_questions,
                chapter_completed = report.is_completed(chapter),
                "mcq finished"
            );
            self.persist(PendingWrite::McqResult {
                user,
                result,
                at: now,
            })
            .await?;
        }

        Ok(CourseView::build(&course, &snapshot, &report))
    }

    /// Writes that were applied locally but not acknowledged by the store.
    #[must_use]
    pub fn pending_writes(&self) -> Vec<PendingWrite> {
        lock(&self.pending).clone()
    }

    /// Re-sends queued writes in order. Returns how many were delivered.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` at the first write the store rejects; that
    /// write and everything after it stay queued.
    pub async fn flush_pending(&self) -> Result<usize, ProgressionError> {
        let queued = std::mem::take(&mut *lock(&self.pending));
        let mut flushed = 0;
        let mut remaining = queued.into_iter();

        while let Some(write) = remaining.next() {
            if let Err(err) = write.send(self.store.as_ref()).await {
                // Writes queued while flushing go after the ones still undelivered.
                let mut pending = lock(&self.pending);
                let newer = std::mem::take(&mut *pending);
                pending.push(write);
                pending.extend(remaining);
                pending.extend(newer);
                drop(pending);
                warn!(flushed, error = %err, "pending progress flush stopped");
                return Err(ProgressionError::PersistenceFailure(err));
            }
            flushed += 1;
        }

        if flushed > 0 {
            info!(flushed, "pending progress writes delivered");
        }
        Ok(flushed)
    }

    async fn load_course(&self, id: CourseId) -> Result<Arc<Course>, ProgressionError> {
        let cached = lock(&self.courses).get(&id).cloned();
        if let Some(course) = cached {
            return Ok(course);
        }

        let course = self
            .catalog
            .get_course(id)
            .await?
            .ok_or(ProgressionError::UnknownCourse(id))?;
        let course = Arc::new(course);
        lock(&self.courses).insert(id, Arc::clone(&course));
        debug!(course = %id, chapters = course.chapters().len(), "course structure cached");
        Ok(course)
    }

    async fn course_for_chapter(&self, chapter: ChapterId) -> Result<Arc<Course>, ProgressionError> {
        let cached = lock(&self.courses)
            .values()
            .find(|c| c.chapter(chapter).is_some())
            .cloned();
        if let Some(course) = cached {
            return Ok(course);
        }

        let course_id = self
            .catalog
            .course_for_chapter(chapter)
            .await?
            .ok_or(ProgressionError::UnknownChapter(chapter))?;
        self.load_course(course_id).await
    }

    async fn local_snapshot(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<ProgressSnapshot, ProgressionError> {
        let cached = lock(&self.snapshots).get(&(user, course)).cloned();
        if let Some(snapshot) = cached {
            return Ok(snapshot);
        }
        let remote = self.store.course_progress(user, course).await?;
        Ok(self.merge_local(user, course, &remote))
    }

    fn merge_local(&self, user: UserId, course: CourseId, remote: &ProgressSnapshot) -> ProgressSnapshot {
        let mut guard = lock(&self.snapshots);
        let local = guard
            .entry((user, course))
            .or_insert_with(|| ProgressSnapshot::new(user, course));
        local.merge(remote);
        local.clone()
    }

    fn apply_local<T>(
        &self,
        user: UserId,
        course: CourseId,
        f: impl FnOnce(&mut ProgressSnapshot) -> T,
    ) -> (T, ProgressSnapshot) {
        let mut guard = lock(&self.snapshots);
        let local = guard
            .entry((user, course))
            .or_insert_with(|| ProgressSnapshot::new(user, course));
        let out = f(local);
        (out, local.clone())
    }

    async fn persist(&self, write: PendingWrite) -> Result<(), ProgressionError> {
        match write.send(self.store.as_ref()).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(
                    user = %write.user(),
                    chapter = %write.chapter(),
                    error = %err,
                    "progress write queued after store failure"
                );
                lock(&self.pending).push(write);
                Err(ProgressionError::PersistenceFailure(err))
            }
        }
    }
}

impl fmt::Debug for ProgressionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressionService")
            .field("clock", &self.clock)
            .field("cached_courses", &lock(&self.courses).len())
            .field("cached_snapshots", &lock(&self.snapshots).len())
            .field("pending", &lock(&self.pending).len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
