use thiserror::Error;

/// Errors surfaced by [`crate::Store`] and its repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("checksum mismatch for {geo_id}/{pmid}: expected {expected}, found {found}")]
    ChecksumMismatch {
        geo_id: String,
        pmid: String,
        expected: String,
        found: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
