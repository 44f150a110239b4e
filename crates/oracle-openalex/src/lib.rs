//! Async Rust client for the works slice of the
//! [OpenAlex REST API](https://docs.openalex.org) that OmicsOracle's P1
//! (citing-papers enumeration) and P2 (OA location enrichment) need.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn example() -> oracle_openalex::Result<()> {
//! use oracle_openalex::OpenAlexClient;
//!
//! let client = OpenAlexClient::new();
//! let response = client.citing_works("W2741809807", 25).await?;
//! for work in &response.results {
//!     println!("{}", work.best_title().unwrap_or("untitled"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! An API key is optional but recommended; set `OPENALEX_KEY` or pass one to
//! [`OpenAlexClient::with_api_key`].

pub mod cache;
pub mod client;
pub mod error;
pub mod params;
pub mod response;
pub mod types;

pub use cache::DiskCache;
pub use client::OpenAlexClient;
pub use error::{OpenAlexError, Result};
pub use params::{GetParams, ListParams};
pub use response::{ListMeta, ListResponse};
pub use types::*;
