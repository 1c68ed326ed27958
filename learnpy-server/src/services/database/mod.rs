//! SQLite repository
//!
//! One store per table group, all sharing the same pool. Migrations are
//! embedded at compile time and run on connect.

use learnpy_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

pub mod contacts;
pub mod lessons;
pub mod questions;
pub mod users;

pub use contacts::ContactStore;
pub use lessons::LessonStore;
pub use questions::QuestionStore;
pub use users::{StoredUser, UserStore};

/// Repository coordinator
#[derive(Debug, Clone)]
pub struct Database {
    pub pool: SqlitePool,
    pub users: UserStore,
    pub lessons: LessonStore,
    pub questions: QuestionStore,
    pub contacts: ContactStore,
}

impl Database {
    /// Open (creating if missing) the database at `database_url` and migrate it
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(database_url, "Database ready");

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            users: UserStore::new(pool.clone()),
            lessons: LessonStore::new(pool.clone()),
            questions: QuestionStore::new(pool.clone()),
            contacts: ContactStore::new(pool.clone()),
            pool,
        }
    }
}
