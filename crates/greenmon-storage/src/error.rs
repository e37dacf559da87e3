/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use greenmon_storage::error::StorageError;
///
/// let err = StorageError::PartitionMissing("2024-01-01".to_string());
/// assert!(err.to_string().contains("2024-01-01"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A partition key was requested before it was opened.
    #[error("Storage: partition {0} not found")]
    PartitionMissing(String),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure while managing partition files.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored enum column held a value this build does not recognise.
    #[error("Storage: invalid value in column '{column}': {value}")]
    InvalidColumn { column: &'static str, value: String },

    /// The blocking task running a SQLite call panicked or was cancelled.
    #[error("Storage: blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
