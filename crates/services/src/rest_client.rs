//! `reqwest` adapter for a remote course backend.
//!
//! Endpoints (relative to the configured base URL):
//!
//! | operation                | request                                          |
//! |--------------------------|--------------------------------------------------|
//! | `get_course`             | `GET  courses/{course}/structure`                |
//! | `upsert_course`          | `PUT  courses/{course}/structure`                |
//! | `course_for_chapter`     | `GET  chapters/{chapter}`                        |
//! | `course_progress`        | `GET  users/{user}/courses/{course}/progress`    |
//! | `record_lesson_completed`| `POST users/{user}/lesson-completed`             |
//! | `record_mcq_result`      | `POST users/{user}/mcq-result`                   |

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::McqResult;
use course_core::model::{
    Chapter, ChapterId, Course, CourseId, Lesson, LessonContent, LessonId, McqQuestion,
    ProgressSnapshot, QuestionId, UserChapterProgress, UserId,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use storage::repository::{CourseCatalog, ProgressStore, StorageError};
use tracing::debug;

/// HTTP-backed [`CourseCatalog`] and [`ProgressStore`].
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestBackend {
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request; `Ok(None)` on 404.
    async fn send(&self, request: RequestBuilder) -> Result<Option<Response>, StorageError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status));
        }
        Ok(Some(response))
    }

    async fn send_ack(&self, request: RequestBuilder) -> Result<(), StorageError> {
        self.send(request)
            .await?
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

impl fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

fn transport(err: reqwest::Error) -> StorageError {
    if err.is_decode() {
        StorageError::Serialization(err.to_string())
    } else {
        StorageError::Connection(err.to_string())
    }
}

fn status_error(status: StatusCode) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict,
        other => StorageError::Connection(format!("unexpected status {other}")),
    }
}

fn invalid(err: impl fmt::Display) -> StorageError {
    StorageError::Serialization(format!("invalid course payload: {err}"))
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[async_trait]
impl CourseCatalog for RestBackend {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let path = format!("courses/{}/structure", course.id());
        let body = CourseStructureDto::from_course(course);
        self.send_ack(self.request(Method::PUT, &path).json(&body))
            .await
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let path = format!("courses/{id}/structure");
        let Some(response) = self.send(self.request(Method::GET, &path)).await? else {
            return Ok(None);
        };
        let dto: CourseStructureDto = response.json().await.map_err(transport)?;
        let course = dto.into_course()?;
        debug!(course = %id, chapters = course.chapters().len(), "fetched course structure");
        Ok(Some(course))
    }

    async fn course_for_chapter(&self, id: ChapterId) -> Result<Option<CourseId>, StorageError> {
        let path = format!("chapters/{id}");
        let Some(response) = self.send(self.request(Method::GET, &path)).await? else {
            return Ok(None);
        };
        let dto: ChapterRefDto = response.json().await.map_err(transport)?;
        Ok(Some(dto.course_id))
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[async_trait]
impl ProgressStore for RestBackend {
    async fn course_progress(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<ProgressSnapshot, StorageError> {
        let path = format!("users/{user}/courses/{course}/progress");
        let Some(response) = self.send(self.request(Method::GET, &path)).await? else {
            // No record yet for this learner.
            return Ok(ProgressSnapshot::new(user, course));
        };
        let dto: CourseProgressDto = response.json().await.map_err(transport)?;
        let snapshot = dto.into_snapshot(user, course);
        debug!(%user, %course, chapters = snapshot.chapters().count(), "fetched course progress");
        Ok(snapshot)
    }

    async fn record_lesson_completed(
        &self,
        user: UserId,
        chapter: ChapterId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let path = format!("users/{user}/lesson-completed");
        let body = LessonCompletedDto {
            chapter_id: chapter,
            lesson_id: lesson,
            completed_at: at,
        };
        self.send_ack(self.request(Method::POST, &path).json(&body))
            .await
    }

    async fn record_mcq_result(
        &self,
        user: UserId,
        result: &McqResult,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let path = format!("users/{user}/mcq-result");
        let body = McqResultDto {
            chapter_id: result.chapter_id,
            passed: result.passed,
            score: result.score,
            total_questions: result.total_questions,
            finished_at: at,
        };
        self.send_ack(self.request(Method::POST, &path).json(&body))
            .await
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize, Deserialize)]
struct CourseStructureDto {
    id: CourseId,
    title: String,
    chapters: Vec<ChapterDto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChapterDto {
    id: ChapterId,
    order: u32,
    title: String,
    #[serde(default)]
    lessons: Vec<LessonDto>,
    #[serde(default)]
    mcqs: Vec<McqDto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LessonDto {
    id: LessonId,
    order: u32,
    title: String,
    content: LessonContent,
    #[serde(default)]
    is_preview: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct McqDto {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_index: usize,
}

#[derive(Debug, Deserialize)]
struct ChapterRefDto {
    course_id: CourseId,
}

#[derive(Debug, Default, Deserialize)]
struct CourseProgressDto {
    #[serde(default)]
    chapters: Vec<ChapterProgressDto>,
}

#[derive(Debug, Deserialize)]
struct ChapterProgressDto {
    chapter_id: ChapterId,
    #[serde(default)]
    completed_lesson_ids: Vec<LessonId>,
    #[serde(default)]
    mcq_attempted: bool,
    #[serde(default)]
    mcq_passed: bool,
    #[serde(default)]
    passed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct LessonCompletedDto {
    chapter_id: ChapterId,
    lesson_id: LessonId,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct McqResultDto {
    chapter_id: ChapterId,
    passed: bool,
    score: u32,
    total_questions: u32,
    finished_at: DateTime<Utc>,
}

impl CourseStructureDto {
    fn from_course(course: &Course) -> Self {
        Self {
            id: course.id(),
            title: course.title().to_owned(),
            chapters: course.chapters().iter().map(ChapterDto::from_chapter).collect(),
        }
    }

    /// Rebuilds the validated domain course; malformed payloads are rejected.
    fn into_course(self) -> Result<Course, StorageError> {
        let course_id = self.id;
        let chapters = self
            .chapters
            .into_iter()
            .map(|chapter| chapter.into_chapter(course_id))
            .collect::<Result<Vec<_>, _>>()?;
        Course::new(course_id, self.title, chapters).map_err(invalid)
    }
}

impl ChapterDto {
    fn from_chapter(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id(),
            order: chapter.order(),
            title: chapter.title().to_owned(),
            lessons: chapter
                .lessons()
                .iter()
                .map(|lesson| LessonDto {
                    id: lesson.id(),
                    order: lesson.order(),
                    title: lesson.title().to_owned(),
                    content: lesson.content().clone(),
                    is_preview: lesson.is_preview(),
                })
                .collect(),
            mcqs: chapter
                .questions()
                .iter()
                .map(|question| McqDto {
                    id: question.id(),
                    text: question.text().to_owned(),
                    options: question.options().to_vec(),
                    correct_index: question.correct_index(),
                })
                .collect(),
        }
    }

    fn into_chapter(self, course_id: CourseId) -> Result<Chapter, StorageError> {
        let chapter_id = self.id;
        let lessons = self
            .lessons
            .into_iter()
            .map(|l| Lesson::new(l.id, chapter_id, l.order, l.title, l.content, l.is_preview))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        let questions = self
            .mcqs
            .into_iter()
            .map(|q| McqQuestion::new(q.id, chapter_id, q.text, q.options, q.correct_index))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        Chapter::new(chapter_id, course_id, self.order, self.title, lessons, questions)
            .map_err(invalid)
    }
}

impl CourseProgressDto {
    fn into_snapshot(self, user: UserId, course: CourseId) -> ProgressSnapshot {
        let records = self.chapters.into_iter().map(|c| {
            UserChapterProgress::from_persisted(
                c.chapter_id,
                c.completed_lesson_ids,
                c.mcq_attempted,
                c.mcq_passed,
                c.passed_at,
            )
        });
        ProgressSnapshot::from_records(user, course, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::CourseError;

    const STRUCTURE: &str = r#"{
        "id": 7,
        "title": "Rust basics",
        "chapters": [
            {
                "id": 2, "order": 2, "title": "Traits",
                "lessons": [
                    { "id": 21, "order": 1, "title": "Intro",
                      "content": { "kind": "text", "value": "hello" } }
                ]
            },
            {
                "id": 1, "order": 1, "title": "Ownership",
                "lessons": [
                    { "id": 11, "order": 1, "title": "Moves", "is_preview": true,
                      "content": { "kind": "video", "value": "https://cdn.example.com/a.mp4" } }
                ],
                "mcqs": [
                    { "id": 100, "text": "Pick b", "options": ["a", "b"], "correct_index": 1 }
                ]
            }
        ]
    }"#;

    #[test]
    fn structure_payload_builds_sorted_course() {
        let dto: CourseStructureDto = serde_json::from_str(STRUCTURE).unwrap();
        let course = dto.into_course().unwrap();

        assert_eq!(course.id(), CourseId::new(7));
        let ids: Vec<_> = course.chapters().iter().map(Chapter::id).collect();
        assert_eq!(ids, vec![ChapterId::new(1), ChapterId::new(2)]);
        assert!(course.chapters()[0].has_mcq());
        assert!(course.chapters()[0].lessons()[0].is_preview());
        assert!(!course.chapters()[1].lessons()[0].is_preview());
    }

    #[test]
    fn structure_with_order_gap_is_rejected() {
        let payload = STRUCTURE.replace(r#""order": 2, "title": "Traits""#, r#""order": 3, "title": "Traits""#);
        let dto: CourseStructureDto = serde_json::from_str(&payload).unwrap();
        let err = dto.into_course().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(err.to_string().contains(
            &CourseError::ChapterOrderGap { expected: 2, found: 3 }.to_string()
        ));
    }

    #[test]
    fn structure_payload_survives_outbound_encoding() {
        let dto: CourseStructureDto = serde_json::from_str(STRUCTURE).unwrap();
        let course = dto.into_course().unwrap();

        let json = serde_json::to_string(&CourseStructureDto::from_course(&course)).unwrap();
        let back: CourseStructureDto = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_course().unwrap(), course);
    }

    #[test]
    fn progress_payload_is_normalized() {
        let payload = r#"{
            "chapters": [
                { "chapter_id": 1, "completed_lesson_ids": [11, 12, 11], "mcq_passed": true,
                  "passed_at": "2023-11-14T22:13:20Z" },
                { "chapter_id": 2, "completed_lesson_ids": [21], "passed_at": "2023-11-14T22:13:20Z" }
            ]
        }"#;
        let dto: CourseProgressDto = serde_json::from_str(payload).unwrap();
        let snap = dto.into_snapshot(UserId::new(1), CourseId::new(7));

        let ch1 = snap.chapter(ChapterId::new(1)).unwrap();
        assert_eq!(ch1.completed_lesson_ids().len(), 2);
        assert!(ch1.mcq_attempted());
        assert!(ch1.mcq_passed());

        let ch2 = snap.chapter(ChapterId::new(2)).unwrap();
        assert!(!ch2.mcq_passed());
        assert_eq!(ch2.passed_at(), None);
    }

    #[test]
    fn empty_progress_payload_is_an_empty_snapshot() {
        let dto: CourseProgressDto = serde_json::from_str("{}").unwrap();
        assert!(dto.into_snapshot(UserId::new(1), CourseId::new(7)).is_empty());
    }

    #[test]
    fn urls_join_base_and_path() {
        let backend = RestBackend::new("https://api.example.com/v1/", None);
        assert_eq!(
            backend.url("users/3/mcq-result"),
            "https://api.example.com/v1/users/3/mcq-result"
        );
    }

    #[test]
    fn status_codes_map_to_storage_errors() {
        assert!(matches!(status_error(StatusCode::CONFLICT), StorageError::Conflict));
        assert!(matches!(status_error(StatusCode::NOT_FOUND), StorageError::NotFound));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY),
            StorageError::Connection(_)
        ));
    }

    #[test]
    fn debug_output_hides_token() {
        let backend = RestBackend::new("https://api.example.com", Some("secret".into()));
        let debug = format!("{backend:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn blank_token_is_dropped() {
        let backend = RestBackend::new("https://api.example.com", Some("  ".into()));
        assert!(backend.token.is_none());
    }
}
