use oracle_sources::clients::{
    AltSourcesClient, ArxivClient, BiorxivClient, CoreClient, CrossrefClient, EuropePmcClient,
    InstitutionalClient, NcbiClient, OpenAlexSource, PmcClient, SemanticScholarClient, UnpaywallClient,
};
use oracle_sources::DiscoveryCache;

use crate::config::OracleConfig;
use crate::error::Result;

/// One instance of every source client, built once by the coordinator and
/// shared across papers within a run (§9 "From globals to injected
/// collaborators" — no client is ever a module-level singleton).
pub struct SourceClients {
    pub ncbi: NcbiClient,
    pub openalex: OpenAlexSource,
    pub semantic_scholar: SemanticScholarClient,
    pub pmc: PmcClient,
    pub europepmc: EuropePmcClient,
    pub unpaywall: Option<UnpaywallClient>,
    pub crossref: CrossrefClient,
    pub core: Option<CoreClient>,
    pub biorxiv: BiorxivClient,
    pub arxiv: ArxivClient,
    pub institutional: InstitutionalClient,
    pub alt_sources: AltSourcesClient,
    pub discovery_cache: DiscoveryCache,
}

impl SourceClients {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let cache_path = config.store_root.join("cache").join("discovery.sqlite");
        let discovery_cache = DiscoveryCache::open(&cache_path, config.discovery_cache_ttl)
            .map_err(oracle_store::StoreError::Sqlite)?;

        Ok(Self {
            ncbi: NcbiClient::new(config.ncbi_email.clone(), config.ncbi_api_key.clone(), config.http_timeouts),
            openalex: OpenAlexSource::new(),
            semantic_scholar: SemanticScholarClient::new(config.semantic_scholar_key.clone(), config.http_timeouts),
            pmc: PmcClient::new(),
            europepmc: EuropePmcClient::new(config.http_timeouts),
            unpaywall: config
                .unpaywall_email
                .clone()
                .map(|email| UnpaywallClient::new(email, config.http_timeouts)),
            crossref: CrossrefClient::new(config.unpaywall_email.clone(), config.http_timeouts),
            core: config.core_api_key.clone().map(|key| CoreClient::new(key, config.http_timeouts)),
            biorxiv: BiorxivClient::new(config.http_timeouts),
            arxiv: ArxivClient::new(config.http_timeouts),
            institutional: InstitutionalClient::new(config.institutional_repos.clone()),
            alt_sources: AltSourcesClient::new(config.alt_sources_enabled()),
            discovery_cache,
        })
    }
}
