use std::collections::HashMap;

use course_core::model::{Chapter, ChapterId, Course, CourseId, Lesson, McqQuestion};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    chapter_id_from_i64, conn, content_from_columns, content_to_columns, course_id_from_i64,
    i64_to_u32, id_to_i64, index_to_i64, lesson_id_from_i64, question_id_from_i64, ser,
    write_err,
};
use crate::repository::{CourseCatalog, StorageError};

#[async_trait::async_trait]
impl CourseCatalog for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let course_id = id_to_i64("course_id", course.id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO courses (id, title)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(course_id)
        .bind(course.title())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // Structure is replaced wholesale; lessons and questions cascade.
        sqlx::query("DELETE FROM chapters WHERE course_id = ?1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for chapter in course.chapters() {
            let chapter_id = id_to_i64("chapter_id", chapter.id().value())?;
            sqlx::query(
                r"
                INSERT INTO chapters (id, course_id, position, title)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(chapter_id)
            .bind(course_id)
            .bind(i64::from(chapter.order()))
            .bind(chapter.title())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

            for lesson in chapter.lessons() {
                let (kind, value) = content_to_columns(lesson.content());
                sqlx::query(
                    r"
                    INSERT INTO lessons (id, chapter_id, position, title, content_kind, content_value, is_preview)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ",
                )
                .bind(id_to_i64("lesson_id", lesson.id().value())?)
                .bind(chapter_id)
                .bind(i64::from(lesson.order()))
                .bind(lesson.title())
                .bind(kind)
                .bind(value)
                .bind(i64::from(lesson.is_preview()))
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
            }

            for (position, question) in chapter.questions().iter().enumerate() {
                let question_id = id_to_i64("question_id", question.id().value())?;
                sqlx::query(
                    r"
                    INSERT INTO mcq_questions (id, chapter_id, position, text, correct_index)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(question_id)
                .bind(chapter_id)
                .bind(index_to_i64("position", position)?)
                .bind(question.text())
                .bind(index_to_i64("correct_index", question.correct_index())?)
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;

                for (opt_position, option) in question.options().iter().enumerate() {
                    sqlx::query(
                        r"
                        INSERT INTO mcq_options (question_id, position, text)
                        VALUES (?1, ?2, ?3)
                        ",
                    )
                    .bind(question_id)
                    .bind(index_to_i64("position", opt_position)?)
                    .bind(option.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(write_err)?;
                }
            }
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(course = %course.id(), chapters = course.chapters().len(), "stored course");
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let course_id = id_to_i64("course_id", id.value())?;

        let Some(course_row) = sqlx::query("SELECT id, title FROM courses WHERE id = ?1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
        else {
            return Ok(None);
        };

        let lesson_rows = sqlx::query(
            r"
            SELECT l.id, l.chapter_id, l.position, l.title, l.content_kind, l.content_value, l.is_preview
            FROM lessons l
            JOIN chapters c ON c.id = l.chapter_id
            WHERE c.course_id = ?1
            ORDER BY l.chapter_id, l.position
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons: HashMap<ChapterId, Vec<Lesson>> = HashMap::new();
        for row in lesson_rows {
            let chapter_id = chapter_id_from_i64(row.try_get("chapter_id").map_err(ser)?)?;
            let kind: String = row.try_get("content_kind").map_err(ser)?;
            let content = content_from_columns(&kind, row.try_get("content_value").map_err(ser)?)?;
            let lesson = Lesson::new(
                lesson_id_from_i64(row.try_get("id").map_err(ser)?)?,
                chapter_id,
                i64_to_u32("lesson position", row.try_get("position").map_err(ser)?)?,
                row.try_get::<String, _>("title").map_err(ser)?,
                content,
                row.try_get::<i64, _>("is_preview").map_err(ser)? != 0,
            )
            .map_err(ser)?;
            lessons.entry(chapter_id).or_default().push(lesson);
        }

        let option_rows = sqlx::query(
            r"
            SELECT o.question_id, o.text
            FROM mcq_options o
            JOIN mcq_questions q ON q.id = o.question_id
            JOIN chapters c ON c.id = q.chapter_id
            WHERE c.course_id = ?1
            ORDER BY o.question_id, o.position
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut options: HashMap<i64, Vec<String>> = HashMap::new();
        for row in option_rows {
            options
                .entry(row.try_get("question_id").map_err(ser)?)
                .or_default()
                .push(row.try_get("text").map_err(ser)?);
        }

        let question_rows = sqlx::query(
            r"
            SELECT q.id, q.chapter_id, q.text, q.correct_index
            FROM mcq_questions q
            JOIN chapters c ON c.id = q.chapter_id
            WHERE c.course_id = ?1
            ORDER BY q.chapter_id, q.position
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions: HashMap<ChapterId, Vec<McqQuestion>> = HashMap::new();
        for row in question_rows {
            let raw_id: i64 = row.try_get("id").map_err(ser)?;
            let chapter_id = chapter_id_from_i64(row.try_get("chapter_id").map_err(ser)?)?;
            let correct_index = usize::try_from(row.try_get::<i64, _>("correct_index").map_err(ser)?)
                .map_err(|_| StorageError::Serialization("correct_index sign overflow".into()))?;
            let question = McqQuestion::new(
                question_id_from_i64(raw_id)?,
                chapter_id,
                row.try_get::<String, _>("text").map_err(ser)?,
                options.remove(&raw_id).unwrap_or_default(),
                correct_index,
            )
            .map_err(ser)?;
            questions.entry(chapter_id).or_default().push(question);
        }

        let chapter_rows = sqlx::query(
            r"
            SELECT id, course_id, position, title
            FROM chapters
            WHERE course_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut chapters = Vec::with_capacity(chapter_rows.len());
        for row in chapter_rows {
            let chapter_id = chapter_id_from_i64(row.try_get("id").map_err(ser)?)?;
            chapters.push(
                Chapter::new(
                    chapter_id,
                    course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
                    i64_to_u32("chapter position", row.try_get("position").map_err(ser)?)?,
                    row.try_get::<String, _>("title").map_err(ser)?,
                    lessons.remove(&chapter_id).unwrap_or_default(),
                    questions.remove(&chapter_id).unwrap_or_default(),
                )
                .map_err(ser)?,
            );
        }

        Course::new(
            course_id_from_i64(course_row.try_get("id").map_err(ser)?)?,
            course_row.try_get::<String, _>("title").map_err(ser)?,
            chapters,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn course_for_chapter(&self, id: ChapterId) -> Result<Option<CourseId>, StorageError> {
        let row = sqlx::query("SELECT course_id FROM chapters WHERE id = ?1")
            .bind(id_to_i64("chapter_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|r| course_id_from_i64(r.try_get("course_id").map_err(ser)?))
            .transpose()
    }
}
