//! One client per external source (§4.2). Each is a thin, single-attempt
//! HTTP wrapper returning the shared [`crate::error::SourceError`] taxonomy;
//! retries and URL-priority sorting happen one layer up, in the pipeline.

pub mod alt_sources;
pub mod biorxiv_arxiv;
pub mod core;
pub mod crossref;
pub mod europepmc;
pub mod institutional;
pub mod ncbi;
pub mod openalex;
pub mod pmc;
pub mod semantic_scholar;
pub mod unpaywall;

pub use alt_sources::AltSourcesClient;
pub use biorxiv_arxiv::{ArxivClient, BiorxivClient};
pub use core::CoreClient;
pub use crossref::CrossrefClient;
pub use europepmc::EuropePmcClient;
pub use institutional::{InstitutionalClient, InstitutionalRepo};
pub use ncbi::NcbiClient;
pub use openalex::OpenAlexSource;
pub use pmc::PmcClient;
pub use semantic_scholar::SemanticScholarClient;
pub use unpaywall::UnpaywallClient;
