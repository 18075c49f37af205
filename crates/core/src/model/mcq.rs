use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{ChapterId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum McqError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("option {0} is blank")]
    BlankOption(usize),

    #[error("correct option index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

/// A chapter-level multiple-choice question with exactly one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McqQuestion {
    id: QuestionId,
    chapter_id: ChapterId,
    text: String,
    options: Vec<String>,
    correct_index: usize,
}

impl McqQuestion {
    /// # Errors
    ///
    /// Returns `McqError` if the text is blank, fewer than two options are given,
    /// an option is blank, or `correct_index` does not point at an option.
    pub fn new(
        id: QuestionId,
        chapter_id: ChapterId,
        text: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
    ) -> Result<Self, McqError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(McqError::EmptyText);
        }
        if options.len() < 2 {
            return Err(McqError::TooFewOptions(options.len()));
        }
        if let Some(blank) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(McqError::BlankOption(blank));
        }
        if correct_index >= options.len() {
            return Err(McqError::CorrectIndexOutOfRange {
                index: correct_index,
                len: options.len(),
            });
        }

        Ok(Self {
            id,
            chapter_id,
            text: text.trim().to_owned(),
            options,
            correct_index,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct_index
    }
}
