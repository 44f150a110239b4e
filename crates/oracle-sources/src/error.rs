/// Error taxonomy shared by every outbound HTTP call (§4.6). The retry layer
/// dispatches on these variants; only `RateLimit`, `Timeout`, `Network`, and
/// `ServerError` are retried.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("rate limited, retry after {retry_after_s:?}s")]
    RateLimit { retry_after_s: Option<u64> },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error (status {0})")]
    ServerError(u16),

    #[error("client error (status {0})")]
    ClientError(u16),

    #[error("not found")]
    NotFound,

    #[error("invalid response: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;

impl SourceError {
    /// §4.6: RateLimit honors `Retry-After` then retries; Timeout/Network/
    /// ServerError use exponential backoff; ClientError/NotFound/Invalid never
    /// retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimit { .. } | SourceError::Timeout | SourceError::Network(_) | SourceError::ServerError(_)
        )
    }

    pub fn from_status(status: reqwest::StatusCode, retry_after_s: Option<u64>) -> Self {
        if status.as_u16() == 429 {
            SourceError::RateLimit { retry_after_s }
        } else if status.as_u16() == 404 {
            SourceError::NotFound
        } else if status.is_server_error() {
            SourceError::ServerError(status.as_u16())
        } else {
            SourceError::ClientError(status.as_u16())
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = err.status() {
            SourceError::from_status(status, None)
        } else {
            SourceError::Network(err.to_string())
        }
    }
}
