use std::sync::Arc;

use futures::stream::{self, StreamExt};
use oracle_sources::Publication;
use oracle_store::{LogLevel, Stage, Store};
use tokio_util::sync::CancellationToken;

use oracle_store::ContentExtraction;

use crate::clients::SourceClients;
use crate::config::OracleConfig;
use crate::discovery::{self, GeoSeriesMetadata};
use crate::download::{self, DownloadOutcome, HostLimiter};
use crate::error::{PipelineError, Result};
use crate::extraction::{self, ParsedContentCache};
use crate::scoring::{self, GeoContext, PaperContext, WEIGHTS_VERSION};
use crate::urls;

const P2_CONCURRENCY: usize = 8;
const P3_CONCURRENCY: usize = 8;
const P4_CONCURRENCY: usize = 4;
const PER_HOST_PERMITS: usize = 2;
const PER_HOST_PERMITS_P2: usize = 4;

/// Per-stage success/failure tallies, emitted as one `processing_log` row
/// per stage (§4.10) and returned to the caller as the user-visible run
/// summary (§7).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct StageSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub geo_id: String,
    pub papers_discovered: usize,
    pub p2: StageSummary,
    pub p3: StageSummary,
    pub p4: StageSummary,
}

/// Drives P1 → P2 → P3 → P4 for one GEO series (§4.10), writing through the
/// store after every stage and proceeding to the next stage only with the
/// subset of papers that succeeded at the previous one.
pub struct Coordinator {
    store: Store,
    clients: SourceClients,
    config: OracleConfig,
    http: reqwest::Client,
    limiter: HostLimiter,
    url_limiter: HostLimiter,
    parsed_cache: ParsedContentCache,
}

impl Coordinator {
    pub fn new(store: Store, config: OracleConfig) -> Result<Self> {
        let clients = SourceClients::new(&config)?;
        let http = oracle_sources::http::build_client(config.http_timeouts);
        let limiter = HostLimiter::new(PER_HOST_PERMITS);
        let url_limiter = HostLimiter::new(PER_HOST_PERMITS_P2);
        let parsed_cache = ParsedContentCache::open(store.root())?;
        Ok(Self { store, clients, config, http, limiter, url_limiter, parsed_cache })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn discovery_cache(&self) -> &oracle_sources::DiscoveryCache {
        &self.clients.discovery_cache
    }

    pub fn parsed_cache(&self) -> &ParsedContentCache {
        &self.parsed_cache
    }

    /// Runs every stage for `geo` from scratch. `cancel` is checked between
    /// papers at each stage; partial results already persisted remain valid
    /// if cancellation fires mid-run.
    pub async fn run(&self, geo: &GeoSeriesMetadata, cancel: &CancellationToken) -> Result<RunSummary> {
        if geo.pubmed_ids.is_empty() {
            return Err(PipelineError::NoSeeds { geo_id: geo.geo_id.clone() });
        }

        let current_year: i32 = chrono::Utc::now().format("%Y").to_string().parse().unwrap_or(2026);
        let discovery_results = discovery::run(&self.store, &self.clients, &self.config, geo, current_year).await?;

        let mut papers: Vec<Publication> = Vec::new();
        for result in &discovery_results {
            papers.push(result.original_paper.clone());
            papers.extend(result.citing_papers.iter().map(|sp| sp.publication.clone()));
        }
        if let Some(max) = self.config.max_papers_per_geo {
            papers.truncate(max);
        }
        let papers_discovered = papers.len();

        self.store.log(
            Stage::P1,
            &geo.geo_id,
            None,
            LogLevel::Info,
            &format!("discovery complete: {papers_discovered} papers"),
            None,
            None,
        )?;

        let p2 = self.run_p2(geo, &papers, cancel).await?;
        let p3 = self.run_p3(geo, &papers, cancel).await?;
        let p4 = self.run_p4(geo, &papers, cancel).await?;

        Ok(RunSummary { geo_id: geo.geo_id.clone(), papers_discovered, p2, p3, p4 })
    }

    /// Scans the store for `(geo_id, pmid)` pairs missing the next stage and
    /// processes only those, per the `--resume` CLI flag (§4.10, §6).
    pub async fn resume(&self, geo_id: &str, cancel: &CancellationToken) -> Result<RunSummary> {
        let missing_p2: Vec<String> = self.store.query_missing_stage(geo_id, Stage::P2)?;
        let missing_p3: Vec<String> = self.store.query_missing_stage(geo_id, Stage::P3)?;
        let missing_p4: Vec<String> = self.store.query_missing_stage(geo_id, Stage::P4)?;

        let papers_for = |pmids: &[String]| -> Result<Vec<Publication>> {
            let mut out = Vec::with_capacity(pmids.len());
            for pmid in pmids {
                if let Some(identifier) = self.store.find_identifier(geo_id, pmid)? {
                    out.push(Publication {
                        pmid: Some(identifier.pmid),
                        doi: identifier.doi,
                        pmcid: identifier.pmcid,
                        title: identifier.title,
                        ..Default::default()
                    });
                }
            }
            Ok(out)
        };

        let p2 = self.run_p2(&GeoSeriesMetadata::stub(geo_id), &papers_for(&missing_p2)?, cancel).await?;
        let p3 = self.run_p3(&GeoSeriesMetadata::stub(geo_id), &papers_for(&missing_p3)?, cancel).await?;
        let p4 = self.run_p4(&GeoSeriesMetadata::stub(geo_id), &papers_for(&missing_p4)?, cancel).await?;

        Ok(RunSummary { geo_id: geo_id.to_string(), papers_discovered: 0, p2, p3, p4 })
    }

    /// Re-runs P2 for one already-known paper, used by `reprocess --stage P2`.
    pub async fn reprocess_p2(&self, geo_id: &str, paper: &Publication) -> Result<usize> {
        let candidates = urls::run(&self.store, &self.clients, &self.config, &self.url_limiter, geo_id, paper).await?;
        Ok(candidates.len())
    }

    /// Re-runs P3 for one already-known paper, used by `reprocess --stage P3`.
    pub async fn reprocess_p3(&self, geo_id: &str, paper: &Publication, cancel: &CancellationToken) -> Result<DownloadOutcome> {
        let pmid = paper.pmid.clone().ok_or_else(|| PipelineError::Config("paper has no pmid".into()))?;
        let candidates = self
            .store
            .list_urls(geo_id, &pmid)?
            .into_iter()
            .map(|row| oracle_sources::UrlCandidate {
                source: row.source,
                url: row.url,
                url_type: row.url_type,
                priority: row.priority,
                evidence: row.evidence,
            })
            .collect();
        download::run(&self.store, &self.http, &self.config, &self.limiter, cancel, geo_id, &pmid, candidates).await
    }

    /// Re-runs P4 for one already-known paper, used by `reprocess --stage P4`.
    pub async fn reprocess_p4(&self, geo_id: &str, pmid: &str) -> Result<Option<ContentExtraction>> {
        extraction::run(&self.store, &self.parsed_cache, geo_id, pmid).await
    }

    async fn run_p2(&self, geo: &GeoSeriesMetadata, papers: &[Publication], cancel: &CancellationToken) -> Result<StageSummary> {
        let mut summary = StageSummary::default();
        let results: Vec<Result<usize>> = stream::iter(papers.iter().filter(|p| p.pmid.is_some()))
            .map(|paper| async move {
                if cancel.is_cancelled() {
                    return Ok(0);
                }
                let candidates = urls::run(&self.store, &self.clients, &self.config, &self.url_limiter, &geo.geo_id, paper).await?;
                Ok(candidates.len())
            })
            .buffer_unordered(P2_CONCURRENCY)
            .collect()
            .await;

        for result in results {
            summary.attempted += 1;
            match result {
                Ok(n) if n > 0 => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(_) => summary.failed += 1,
            }
        }

        self.store.log(
            Stage::P2,
            &geo.geo_id,
            None,
            LogLevel::Info,
            &format!("p2 complete: {}/{} papers got at least one url", summary.succeeded, summary.attempted),
            None,
            None,
        )?;
        Ok(summary)
    }

    async fn run_p3(&self, geo: &GeoSeriesMetadata, papers: &[Publication], cancel: &CancellationToken) -> Result<StageSummary> {
        let mut summary = StageSummary::default();
        let results: Vec<Result<Option<DownloadOutcome>>> = stream::iter(papers.iter().filter(|p| p.pmid.is_some()))
            .map(|paper| async move {
                let pmid = paper.pmid.clone().unwrap();
                if cancel.is_cancelled() {
                    return Ok(Some(DownloadOutcome::Cancelled));
                }
                let candidates: Vec<_> = self.store.list_urls(&geo.geo_id, &pmid)?.into_iter().map(|row| oracle_sources::UrlCandidate {
                    source: row.source,
                    url: row.url,
                    url_type: row.url_type,
                    priority: row.priority,
                    evidence: row.evidence,
                }).collect();
                // Papers without a discovered URL never enter P3 (§4.10).
                if candidates.is_empty() {
                    return Ok(None);
                }
                let outcome = download::run(&self.store, &self.http, &self.config, &self.limiter, cancel, &geo.geo_id, &pmid, candidates).await?;
                Ok(Some(outcome))
            })
            .buffer_unordered(P3_CONCURRENCY)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(None) => {}
                Ok(Some(DownloadOutcome::Downloaded { .. })) | Ok(Some(DownloadOutcome::AlreadyPresent)) => {
                    summary.attempted += 1;
                    summary.succeeded += 1;
                }
                Ok(Some(_)) | Err(_) => {
                    summary.attempted += 1;
                    summary.failed += 1;
                }
            }
        }

        self.store.log(
            Stage::P3,
            &geo.geo_id,
            None,
            LogLevel::Info,
            &format!("p3 complete: {}/{} downloads succeeded", summary.succeeded, summary.attempted),
            None,
            None,
        )?;
        Ok(summary)
    }

    async fn run_p4(&self, geo: &GeoSeriesMetadata, papers: &[Publication], cancel: &CancellationToken) -> Result<StageSummary> {
        let mut summary = StageSummary::default();
        let geo_ctx_title = geo.title.clone();
        let geo_ctx_summary = geo.summary.clone();
        let geo_ctx_keywords = geo.keywords.clone();
        let current_year: i32 = chrono::Utc::now().format("%Y").to_string().parse().unwrap_or(2026);

        let results: Vec<Result<bool>> = stream::iter(papers.iter().filter(|p| p.pmid.is_some()))
            .map(|paper| {
                let geo_id = geo.geo_id.clone();
                let pmid = paper.pmid.clone().unwrap();
                async move {
                    if cancel.is_cancelled() {
                        return Ok(false);
                    }
                    let extraction = extraction::run(&self.store, &self.parsed_cache, &geo_id, &pmid).await?;
                    let Some(extraction) = extraction else { return Ok(false) };

                    let geo_ctx = GeoContext { title: &geo_ctx_title, summary: &geo_ctx_summary, keywords: &geo_ctx_keywords };
                    let paper_ctx = PaperContext {
                        title: &paper.title,
                        abstract_text: extraction.abstract_text.as_deref().or(paper.abstract_text.as_deref()),
                        keywords: &paper.keywords,
                        mesh_terms: &paper.mesh_terms,
                        age_years: paper.year.map(|y| (current_year - y).max(0) as f64).unwrap_or(10.0),
                        citations: paper.citations.unwrap_or(0),
                    };
                    let (components, total) = scoring::score(&geo_ctx, &paper_ctx);
                    self.store.save_score(&geo_id, &pmid, &components, total, WEIGHTS_VERSION)?;
                    Ok(true)
                }
            })
            .buffer_unordered(P4_CONCURRENCY)
            .collect()
            .await;

        for result in results {
            summary.attempted += 1;
            match result {
                Ok(true) => summary.succeeded += 1,
                _ => summary.failed += 1,
            }
        }

        self.store.log(
            Stage::P4,
            &geo.geo_id,
            None,
            LogLevel::Info,
            &format!("p4 complete: {}/{} extractions succeeded", summary.succeeded, summary.attempted),
            None,
            None,
        )?;
        Ok(summary)
    }
}

impl GeoSeriesMetadata {
    /// Minimal stand-in used by `--resume`, where only `geo_id` is known and
    /// the GEO's original title/summary/keywords are not re-supplied.
    fn stub(geo_id: &str) -> Self {
        Self { geo_id: geo_id.to_string(), pubmed_ids: Vec::new(), title: String::new(), summary: String::new(), keywords: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_summary_defaults_to_zero() {
        let summary = StageSummary::default();
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
    }
}
