use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("long-running operation finished with status {status}: {message}")]
    OperationFailed { status: String, message: String },

    #[error("waiting for completion: {0}")]
    Cancelled(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
