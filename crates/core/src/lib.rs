//! Domain model and progression rules for gated courses.
//!
//! Courses are split into ordered chapters; each chapter holds ordered lessons
//! and an optional multiple-choice assessment. [`gating`] decides which chapters
//! are locked or completed for a learner, and [`attempt`] runs the MCQ that
//! closes a chapter. Everything in this crate is synchronous and free of I/O.

#![forbid(unsafe_code)]

pub mod attempt;
pub mod gating;
pub mod model;
pub mod time;

pub use attempt::{AnswerOutcome, AttemptError, AttemptState, McqAttempt, McqResult};
pub use gating::{AccessError, ChapterStatus, GatingReport, evaluate, evaluate_chapters};
pub use time::Clock;
