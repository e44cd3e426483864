/// Error type for backend and cache-layer operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// A transport-level failure (injected fault, timeout, 5xx).
    ///
    /// These are transient: the retry wrapper may re-attempt them, and the
    /// mutation engine treats them as a rollback trigger.
    #[error("network request failed: {0}")]
    Network(String),

    /// The backend answered with a typed failure envelope (`success: false`),
    /// e.g. a missing entity. Never retried.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// A list response did not match any of the documented envelope shapes.
    ///
    /// This is a contract violation, not a runtime condition to recover from.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl ApiError {
    /// Whether the retry wrapper is allowed to re-attempt the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}
