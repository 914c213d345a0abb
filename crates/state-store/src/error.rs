use thiserror::Error;

/// Errors that can occur when writing to or reading from a state repository.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An I/O error occurred while appending to a log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be mapped back to a record.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The backend refused the write (used by test doubles).
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Result type for state repository operations.
pub type Result<T> = std::result::Result<T, StateStoreError>;
