/// Errors returned by [`crate::OpenAlexClient`] methods.
#[derive(Debug, thiserror::Error)]
pub enum OpenAlexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API returned a non-success HTTP status code. `status` is the raw
    /// code; `oracle-sources` classifies it into the shared error taxonomy.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, OpenAlexError>;
