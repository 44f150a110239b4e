/// Error taxonomy surfaced by the pipeline crate (§7). `oracle-cli` maps
/// these onto the process exit codes of §6.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] oracle_store::StoreError),

    #[error(transparent)]
    Source(#[from] oracle_sources::SourceError),

    #[error("no seed PMIDs provided for {geo_id}")]
    NoSeeds { geo_id: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
