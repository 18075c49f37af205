use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{ChapterId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson order must be >= 1")]
    InvalidOrder,

    #[error("lesson text cannot be empty")]
    EmptyText,

    #[error("lesson image set cannot be empty")]
    EmptyImageSet,

    #[error("invalid content url: {0}")]
    InvalidUrl(String),
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// What a lesson shows to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LessonContent {
    Video(Url),
    Images(Vec<Url>),
    Text(String),
}

impl LessonContent {
    /// Parses a video reference.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::InvalidUrl` if the string is not an absolute URL.
    pub fn video(url: impl AsRef<str>) -> Result<Self, LessonError> {
        parse_url(url.as_ref()).map(LessonContent::Video)
    }

    /// Parses an image set. At least one image is required.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyImageSet` or `LessonError::InvalidUrl`.
    pub fn images<I, S>(urls: I) -> Result<Self, LessonError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|u| parse_url(u.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if urls.is_empty() {
            return Err(LessonError::EmptyImageSet);
        }
        Ok(LessonContent::Images(urls))
    }

    /// # Errors
    ///
    /// Returns `LessonError::EmptyText` for blank text.
    pub fn text(body: impl Into<String>) -> Result<Self, LessonError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(LessonError::EmptyText);
        }
        Ok(LessonContent::Text(body))
    }
}

fn parse_url(raw: &str) -> Result<Url, LessonError> {
    let trimmed = raw.trim();
    Url::parse(trimmed).map_err(|_| LessonError::InvalidUrl(trimmed.to_owned()))
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single unit of content inside a chapter.
///
/// Preview lessons stay reachable even when their chapter is locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lesson {
    id: LessonId,
    chapter_id: ChapterId,
    order: u32,
    title: String,
    content: LessonContent,
    is_preview: bool,
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `LessonError::InvalidOrder` if `order` is zero.
    pub fn new(
        id: LessonId,
        chapter_id: ChapterId,
        order: u32,
        title: impl Into<String>,
        content: LessonContent,
        is_preview: bool,
    ) -> Result<Self, LessonError> {
        if order == 0 {
            return Err(LessonError::InvalidOrder);
        }
        Ok(Self {
            id,
            chapter_id,
            order,
            title: title.into().trim().to_owned(),
            content,
            is_preview,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &LessonContent {
        &self.content
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.is_preview
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
