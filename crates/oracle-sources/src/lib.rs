//! HTTP client family for every bibliographic and open-access source the
//! pipeline talks to, plus the shared pieces every one of them needs: the
//! error taxonomy, the retry combinator, URL classification, and the
//! discovery cache that sits in front of all of it.

pub mod cache;
pub mod classify;
pub mod clients;
pub mod error;
pub mod http;
pub mod retry;
pub mod types;

pub use cache::{CacheStats, DiscoveryCache};
pub use classify::classify_url;
pub use error::{Result, SourceError};
pub use http::HttpTimeouts;
pub use retry::RetryPolicy;
pub use types::{
    CacheStatus, DedupKey, DiscoveryResult, Publication, ScoredPublication, UrlCandidate, normalize_doi, normalize_title,
};
