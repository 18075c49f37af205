//! MCQ attempt engine: walks a learner through a chapter's questions one at a
//! time and produces a pass/fail verdict.
//!
//! An attempt only exists once started, so "not started" is the absence of a
//! [`McqAttempt`]. Nothing here touches persistence; dropping or
//! [`abandon`](McqAttempt::abandon)ing an unfinished attempt has no effect on
//! progress.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gating::ChapterStatus;
use crate::model::{Chapter, ChapterId, McqQuestion, QuestionId, UserChapterProgress};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("chapter {0} is locked")]
    ChapterLocked(ChapterId),

    #[error("chapter {0} MCQ already passed")]
    AlreadyPassed(ChapterId),

    #[error("chapter {0} has no questions")]
    NoQuestions(ChapterId),

    #[error("option {selected} is out of range for {len} options")]
    OptionOutOfRange { selected: usize, len: usize },

    #[error("attempt already finished")]
    Finished,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptState {
    InProgress { question_index: usize },
    Finished { passed: bool },
}

/// One recorded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub selected: usize,
    pub correct: bool,
}

/// Verdict of a finished attempt, as reported to the progress store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqResult {
    pub chapter_id: ChapterId,
    pub passed: bool,
    pub score: u32,
    pub total_questions: u32,
}

/// What happened after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Next { correct: bool, question_index: usize },
    Finished { correct: bool, result: McqResult },
}

impl AnswerOutcome {
    #[must_use]
    pub fn was_correct(&self) -> bool {
        match self {
            AnswerOutcome::Next { correct, .. } | AnswerOutcome::Finished { correct, .. } => {
                *correct
            }
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<McqResult> {
        match self {
            AnswerOutcome::Finished { result, .. } => Some(*result),
            AnswerOutcome::Next { .. } => None,
        }
    }
}

/// Aggregated view of attempt progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_finished: bool,
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// A single run through a chapter's MCQ.
///
/// Passing requires every question to be answered correctly. Each run starts
/// from scratch; nothing is remembered between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqAttempt {
    chapter_id: ChapterId,
    questions: Vec<McqQuestion>,
    answers: Vec<AnswerRecord>,
    state: AttemptState,
}

impl McqAttempt {
    /// Starts an attempt for `chapter`.
    ///
    /// `status` must come from a gating pass over the learner's current progress.
    ///
    /// # Errors
    ///
    /// - `AttemptError::ChapterLocked` when the chapter is locked.
    /// - `AttemptError::AlreadyPassed` when the learner already passed this MCQ.
    /// - `AttemptError::NoQuestions` when the chapter has no MCQ.
    pub fn start(
        chapter: &Chapter,
        status: ChapterStatus,
        progress: Option<&UserChapterProgress>,
    ) -> Result<Self, AttemptError> {
        if status.locked {
            return Err(AttemptError::ChapterLocked(chapter.id()));
        }
        if progress.is_some_and(UserChapterProgress::mcq_passed) {
            return Err(AttemptError::AlreadyPassed(chapter.id()));
        }
        if !chapter.has_mcq() {
            return Err(AttemptError::NoQuestions(chapter.id()));
        }

        Ok(Self {
            chapter_id: chapter.id(),
            questions: chapter.questions().to_vec(),
            answers: Vec::with_capacity(chapter.questions().len()),
            state: AttemptState::InProgress { question_index: 0 },
        })
    }

    #[must_use]
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, AttemptState::Finished { .. })
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    /// The question awaiting an answer, or `None` once finished.
    #[must_use]
    pub fn current_question(&self) -> Option<&McqQuestion> {
        match self.state {
            AttemptState::InProgress { question_index } => self.questions.get(question_index),
            AttemptState::Finished { .. } => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        let total = self.questions.len();
        let answered = self.answers.len();
        AttemptProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_finished: self.is_finished(),
        }
    }

    /// Records `selected` for the current question and advances.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Finished` once the attempt is over, or
    /// `AttemptError::OptionOutOfRange` (state unchanged) for an invalid option.
    pub fn answer(&mut self, selected: usize) -> Result<AnswerOutcome, AttemptError> {
        let AttemptState::InProgress { question_index } = self.state else {
            return Err(AttemptError::Finished);
        };
        let question = self
            .questions
            .get(question_index)
            .ok_or(AttemptError::Finished)?;

        let len = question.options().len();
        if selected >= len {
            return Err(AttemptError::OptionOutOfRange { selected, len });
        }

        let correct = question.is_correct(selected);
        self.answers.push(AnswerRecord {
            question_id: question.id(),
            selected,
            correct,
        });

        let next = question_index + 1;
        if next < self.questions.len() {
            self.state = AttemptState::InProgress {
                question_index: next,
            };
            return Ok(AnswerOutcome::Next {
                correct,
                question_index: next,
            });
        }

        let result = self.verdict();
        self.state = AttemptState::Finished {
            passed: result.passed,
        };
        Ok(AnswerOutcome::Finished { correct, result })
    }

    /// The verdict once finished.
    #[must_use]
    pub fn result(&self) -> Option<McqResult> {
        self.is_finished().then(|| self.verdict())
    }

    /// Drops the attempt. Nothing has been persisted, so nothing is undone.
    pub fn abandon(self) {}

    fn verdict(&self) -> McqResult {
        let score = self.answers.iter().filter(|a| a.correct).count();
        let total = self.questions.len();
        McqResult {
            chapter_id: self.chapter_id,
            passed: score == total,
            score: u32::try_from(score).unwrap_or(u32::MAX),
            total_questions: u32::try_from(total).unwrap_or(u32::MAX),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
