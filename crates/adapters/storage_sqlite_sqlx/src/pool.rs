//! Connection pool for the rule and telemetry stores.
//!
//! The database is usually shared with the process ingesting telemetry, so
//! file databases run in WAL mode with a busy timeout: the engine only reads
//! while the ingestion side appends.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StorageError;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings of the `SQLite` storage adapter.
pub struct Config {
    /// `sqlite:autorule.db?mode=rwc`, `sqlite::memory:`, ...
    pub database_url: String,
}

impl Config {
    /// Open the pool and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the URL is invalid, the database cannot
    /// be opened, or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::open(&self.database_url).await
    }
}

/// Open pool with migrations applied.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn open(database_url: &str) -> Result<Self, StorageError> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // an in-memory database lives as long as its connections
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
