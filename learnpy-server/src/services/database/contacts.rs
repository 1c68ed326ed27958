//! Contact form inbox

use chrono::Utc;
use learnpy_common::types::{Contact, ContactInput};
use learnpy_common::Result;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct ContactStore {
    pool: SqlitePool,
}

impl ContactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, username: &str, input: &ContactInput) -> Result<Contact> {
        let contact = sqlx::query_as::<_, Contact>(
            "INSERT INTO contacts (username, subject, message, created_at) VALUES (?, ?, ?, ?) \
             RETURNING id, username, subject, message, created_at",
        )
        .bind(username)
        .bind(&input.subject)
        .bind(&input.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(contact)
    }

    /// All messages, newest first
    pub async fn list(&self) -> Result<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT id, username, subject, message, created_at FROM contacts \
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::test_support::scratch_database;

    #[tokio::test]
    async fn test_inbox_round() {
        let (db, _dir) = scratch_database().await;
        for subject in ["bug", "thanks"] {
            db.contacts
                .create(
                    "alice",
                    &ContactInput {
                        subject: subject.to_string(),
                        message: "hi".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let inbox = db.contacts.list().await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].subject, "thanks");
        assert_eq!(inbox[0].username, "alice");

        assert!(db.contacts.delete(inbox[0].id).await.unwrap());
        assert!(!db.contacts.delete(inbox[0].id).await.unwrap());
        assert_eq!(db.contacts.list().await.unwrap().len(), 1);
    }
}
