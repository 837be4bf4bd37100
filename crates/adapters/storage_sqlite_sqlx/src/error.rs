//! Storage-specific error type wrapping sqlx errors.

use autorule_domain::error::AutoRuleError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize a rule document.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for AutoRuleError {
    fn from(err: StorageError) -> Self {
        Self::transient(err)
    }
}
