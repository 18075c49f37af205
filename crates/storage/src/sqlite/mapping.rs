use course_core::model::{
    ChapterId, CourseId, LessonContent, LessonId, QuestionId, UserChapterProgress, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Unique violations while writing catalog rows mean another course owns the id.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        other => conn(other),
    }
}

pub(crate) fn index_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn chapter_id_from_i64(v: i64) -> Result<ChapterId, StorageError> {
    Ok(ChapterId::new(i64_to_u64("chapter_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn user_id_to_i64(user: UserId) -> Result<i64, StorageError> {
    id_to_i64("user_id", user.value())
}

/// Splits lesson content into `(content_kind, content_value)` columns.
///
/// Image sets are stored newline-separated; parsed URLs never contain a newline.
pub(crate) fn content_to_columns(content: &LessonContent) -> (&'static str, String) {
    match content {
        LessonContent::Video(url) => ("video", url.to_string()),
        LessonContent::Images(urls) => (
            "images",
            urls.iter()
                .map(|u| u.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        LessonContent::Text(body) => ("text", body.clone()),
    }
}

pub(crate) fn content_from_columns(kind: &str, value: String) -> Result<LessonContent, StorageError> {
    match kind {
        "video" => LessonContent::video(value).map_err(ser),
        "images" => LessonContent::images(value.lines()).map_err(ser),
        "text" => LessonContent::text(value).map_err(ser),
        other => Err(StorageError::Serialization(format!(
            "invalid content kind: {other}"
        ))),
    }
}

pub(crate) fn map_mcq_progress_row(
    row: &SqliteRow,
    lessons: Vec<LessonId>,
) -> Result<UserChapterProgress, StorageError> {
    Ok(UserChapterProgress::from_persisted(
        chapter_id_from_i64(row.try_get::<i64, _>("chapter_id").map_err(ser)?)?,
        lessons,
        row.try_get::<i64, _>("attempted").map_err(ser)? != 0,
        row.try_get::<i64, _>("passed").map_err(ser)? != 0,
        row.try_get("passed_at").map_err(ser)?,
    ))
}
