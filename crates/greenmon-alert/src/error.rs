use greenmon_storage::error::StorageError;

/// Errors raised by threshold configuration and the alert engine.
///
/// # Examples
///
/// ```rust
/// use greenmon_alert::error::AlertError;
///
/// let err = AlertError::Timeout { operation: "insert", after_ms: 500 };
/// assert_eq!(err.to_string(), "Alert: store insert timed out after 500ms");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// A threshold table violates `high > low` or has a negative delta.
    #[error("Alert: invalid thresholds: {0}")]
    InvalidThresholds(String),

    /// The alert store returned an error.
    #[error("Alert: store error: {0}")]
    Store(#[from] StorageError),

    /// A store call did not finish within the configured timeout.
    #[error("Alert: store {operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

pub type Result<T> = std::result::Result<T, AlertError>;
