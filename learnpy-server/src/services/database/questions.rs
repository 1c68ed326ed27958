//! Forum questions and answers

use chrono::Utc;
use learnpy_common::types::{Answer, AnswerInput, Question, QuestionInput};
use learnpy_common::{AppError, Result};
use sqlx::SqlitePool;

/// How many questions the forum index shows
pub const LATEST_QUESTIONS: i64 = 20;

#[derive(Debug, Clone)]
pub struct QuestionStore {
    pool: SqlitePool,
}

impl QuestionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &QuestionInput, author: &str) -> Result<Question> {
        let id = sqlx::query(
            "INSERT INTO questions (title, content, author, created_at, answers) VALUES (?, ?, ?, ?, 0)",
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(author)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get(id)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("question {} vanished after insert", id)))
    }

    pub async fn get(&self, id: i64) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(
            "SELECT id, title, content, author, created_at, answers FROM questions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }

    /// Most recent questions, newest first
    pub async fn latest(&self, limit: i64) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT id, title, content, author, created_at, answers FROM questions \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    /// Delete a question together with its answers
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM answers WHERE question_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    /// Post an answer and bump the question's counter in one transaction.
    ///
    /// `None` when the question does not exist.
    pub async fn add_answer(
        &self,
        question_id: i64,
        input: &AnswerInput,
        author: &str,
    ) -> Result<Option<Answer>> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE questions SET answers = answers + 1 WHERE id = ?")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        if bumped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let answer = sqlx::query_as::<_, Answer>(
            "INSERT INTO answers (question_id, content, author, created_at) VALUES (?, ?, ?, ?) \
             RETURNING id, question_id, content, author, created_at",
        )
        .bind(question_id)
        .bind(&input.content)
        .bind(author)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(answer))
    }

    /// Answers to a question, oldest first
    pub async fn answers(&self, question_id: i64) -> Result<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(
            "SELECT id, question_id, content, author, created_at FROM answers \
             WHERE question_id = ? ORDER BY created_at, id",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(answers)
    }
}
