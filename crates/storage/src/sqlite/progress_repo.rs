use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use course_core::McqResult;
use course_core::model::{
    ChapterId, CourseId, LessonId, ProgressSnapshot, UserChapterProgress, UserId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    chapter_id_from_i64, conn, id_to_i64, lesson_id_from_i64, map_mcq_progress_row, ser,
    user_id_to_i64,
};
use crate::repository::{ProgressStore, StorageError};

#[async_trait::async_trait]
impl ProgressStore for SqliteRepository {
    async fn course_progress(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<ProgressSnapshot, StorageError> {
        let user_id = user_id_to_i64(user)?;
        let course_id = id_to_i64("course_id", course.value())?;

        let lesson_rows = sqlx::query(
            r"
            SELECT lc.chapter_id, lc.lesson_id
            FROM lesson_completions lc
            JOIN chapters c ON c.id = lc.chapter_id
            WHERE lc.user_id = ?1 AND c.course_id = ?2
            ",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons: BTreeMap<ChapterId, BTreeSet<LessonId>> = BTreeMap::new();
        for row in lesson_rows {
            let chapter = chapter_id_from_i64(row.try_get("chapter_id").map_err(ser)?)?;
            let lesson = lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?;
            lessons.entry(chapter).or_default().insert(lesson);
        }

        let mcq_rows = sqlx::query(
            r"
            SELECT m.chapter_id, m.attempted, m.passed, m.passed_at
            FROM chapter_mcq_progress m
            JOIN chapters c ON c.id = m.chapter_id
            WHERE m.user_id = ?1 AND c.course_id = ?2
            ",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut records = Vec::with_capacity(lessons.len().max(mcq_rows.len()));
        for row in mcq_rows {
            let chapter = chapter_id_from_i64(row.try_get("chapter_id").map_err(ser)?)?;
            let done = lessons.remove(&chapter).unwrap_or_default();
            records.push(map_mcq_progress_row(&row, done.into_iter().collect())?);
        }
        for (chapter, done) in lessons {
            records.push(UserChapterProgress::from_persisted(
                chapter, done, false, false, None,
            ));
        }

        tracing::debug!(%user, %course, chapters = records.len(), "loaded course progress");
        Ok(ProgressSnapshot::from_records(user, course, records))
    }

    async fn record_lesson_completed(
        &self,
        user: UserId,
        chapter: ChapterId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_completions (user_id, chapter_id, lesson_id, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, chapter_id, lesson_id) DO NOTHING
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(id_to_i64("chapter_id", chapter.value())?)
        .bind(id_to_i64("lesson_id", lesson.value())?)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn record_mcq_result(
        &self,
        user: UserId,
        result: &McqResult,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let passed_at = result.passed.then_some(at);

        // passed only moves 0 -> 1 and passed_at keeps the earliest pass.
        sqlx::query(
            r"
            INSERT INTO chapter_mcq_progress (
                user_id, chapter_id, attempted, passed, passed_at,
                best_score, total_questions, updated_at
            )
            VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id, chapter_id) DO UPDATE SET
                attempted = 1,
                passed = MAX(chapter_mcq_progress.passed, excluded.passed),
                passed_at = CASE
                    WHEN chapter_mcq_progress.passed_at IS NULL THEN excluded.passed_at
                    WHEN excluded.passed_at IS NULL THEN chapter_mcq_progress.passed_at
                    ELSE MIN(chapter_mcq_progress.passed_at, excluded.passed_at)
                END,
                best_score = MAX(chapter_mcq_progress.best_score, excluded.best_score),
                total_questions = excluded.total_questions,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(id_to_i64("chapter_id", result.chapter_id.value())?)
        .bind(i64::from(result.passed))
        .bind(passed_at)
        .bind(i64::from(result.score))
        .bind(i64::from(result.total_questions))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
