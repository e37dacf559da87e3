/// Errors that can occur while delivering live events.
///
/// # Examples
///
/// ```rust
/// use greenmon_notify::error::NotifyError;
///
/// let err = NotifyError::Api {
///     service: "webhook".to_string(),
///     status: 502,
///     body: "bad gateway".to_string(),
/// };
/// assert!(err.to_string().contains("status=502"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// An HTTP request to an external endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Event serialization failed.
    #[error("Notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external endpoint returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    Api {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Notify: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
