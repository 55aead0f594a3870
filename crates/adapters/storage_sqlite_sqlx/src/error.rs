//! Storage-specific error type wrapping sqlx errors.

use netalloc_domain::error::AllocationError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to (de)serialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored column holds a value the domain does not recognise.
    #[error("cannot decode stored value: {0}")]
    Decode(String),
}

impl From<StorageError> for AllocationError {
    fn from(err: StorageError) -> Self {
        Self::storage(err)
    }
}
