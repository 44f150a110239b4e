//! P1–P4 acquisition pipeline — citation discovery, URL collection,
//! artifact download, and content extraction — plus the coordinator that
//! drives them over one GEO series and the shared configuration and
//! relevance-scoring model they all depend on.

pub mod clients;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod download;
pub mod error;
pub mod extraction;
pub mod scoring;
pub mod urls;

pub use clients::SourceClients;
pub use config::OracleConfig;
pub use coordinator::{Coordinator, RunSummary, StageSummary};
pub use discovery::GeoSeriesMetadata;
pub use download::{DownloadOutcome, HostLimiter};
pub use error::{PipelineError, Result};
pub use extraction::ParsedContentCache;
