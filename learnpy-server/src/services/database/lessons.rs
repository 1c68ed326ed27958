//! Lessons and their reference solutions

use chrono::Utc;
use learnpy_common::types::{Lesson, LessonInput, LessonStatus, LessonUpdate, Solution};
use learnpy_common::{AppError, Result};
use sqlx::SqlitePool;

const LESSON_COLUMNS: &str =
    "id, title, content, code_example, exercise, video_url, author, created_at, status, kind";

/// Lesson kind for material written through the site
pub const KIND_LESSON: &str = "lesson";

#[derive(Debug, Clone)]
pub struct LessonStore {
    pool: SqlitePool,
}

impl LessonStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a lesson, plus its solution when `solution_code` is non-empty
    pub async fn create(
        &self,
        input: &LessonInput,
        author: &str,
        status: LessonStatus,
        kind: &str,
    ) -> Result<Lesson> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO lessons (title, content, code_example, exercise, video_url, author, created_at, status, kind) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.code_example)
        .bind(&input.exercise)
        .bind(&input.video_url)
        .bind(author)
        .bind(Utc::now())
        .bind(status)
        .bind(kind)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        if !input.solution_code.trim().is_empty() {
            sqlx::query(
                "INSERT INTO solutions (lesson_id, solution_code, explanation) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(&input.solution_code)
            .bind(&input.solution_explanation)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get(id)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("lesson {} vanished after insert", id)))
    }

    pub async fn get(&self, id: i64) -> Result<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {} FROM lessons WHERE id = ?",
            LESSON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lesson)
    }

    /// Replace the editable fields; `None` when the lesson does not exist
    pub async fn update(&self, id: i64, update: &LessonUpdate) -> Result<Option<Lesson>> {
        let updated = sqlx::query(
            "UPDATE lessons SET title = ?, content = ?, code_example = ?, exercise = ?, video_url = ? \
             WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(&update.code_example)
        .bind(&update.exercise)
        .bind(&update.video_url)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Delete a lesson together with its solution
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM solutions WHERE lesson_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM lessons WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    /// Lessons in `status`, newest first
    pub async fn list_by_status(&self, status: LessonStatus) -> Result<Vec<Lesson>> {
        let lessons = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {} FROM lessons WHERE status = ? ORDER BY created_at DESC, id DESC",
            LESSON_COLUMNS
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(lessons)
    }

    pub async fn solution(&self, lesson_id: i64) -> Result<Option<Solution>> {
        let solution = sqlx::query_as::<_, Solution>(
            "SELECT solution_code, explanation FROM solutions WHERE lesson_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(solution)
    }

    /// Move a lesson through moderation; false when it does not exist
    pub async fn set_status(&self, id: i64, status: LessonStatus) -> Result<bool> {
        let updated = sqlx::query("UPDATE lessons SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(updated.rows_affected() > 0)
    }
}
