//! Accounts

use chrono::Utc;
use learnpy_common::types::UserProfile;
use learnpy_common::{AppError, Result};
use sqlx::SqlitePool;

/// Account row including the password hash; never serialized
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredUser {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

fn username_taken(err: sqlx::Error, username: &str) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("username '{}' is already taken", username))
        }
        other => other.into(),
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new account; `Conflict` when the username exists
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<UserProfile> {
        let id = sqlx::query(
            "INSERT INTO users (username, password_hash, is_admin, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| username_taken(e, username))?
        .last_insert_rowid();

        self.get(id)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("user {} vanished after insert", id)))
    }

    pub async fn get(&self, id: i64) -> Result<Option<UserProfile>> {
        let user = sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, is_admin, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Look up the stored credentials for `username`
    pub async fn find_by_username(&self, username: &str) -> Result<Option<StoredUser>> {
        let user = sqlx::query_as::<_, StoredUser>(
            "SELECT id, username, password_hash, is_admin FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Rename the account and optionally replace its password hash
    pub async fn update_profile(
        &self,
        id: i64,
        username: &str,
        password_hash: Option<&str>,
    ) -> Result<UserProfile> {
        let updated = sqlx::query(
            "UPDATE users SET username = ?, password_hash = COALESCE(?, password_hash) WHERE id = ?",
        )
        .bind(username)
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| username_taken(e, username))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {}", id)));
        }

        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    /// Make sure `username` exists and is an administrator.
    ///
    /// An existing account keeps its password. Returns true when the
    /// account was created.
    pub async fn ensure_admin(&self, username: &str, password_hash: &str) -> Result<bool> {
        if self.find_by_username(username).await?.is_some() {
            sqlx::query("UPDATE users SET is_admin = 1 WHERE username = ?")
                .bind(username)
                .execute(&self.pool)
                .await?;
            return Ok(false);
        }

        self.create(username, password_hash, true).await?;
        Ok(true)
    }
}
