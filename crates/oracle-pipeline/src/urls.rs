use oracle_sources::classify::sort_key;
use oracle_sources::{Publication, UrlCandidate};
use oracle_store::{LogLevel, Stage, Store};

use crate::clients::SourceClients;
use crate::config::OracleConfig;
use crate::download::HostLimiter;
use crate::error::{PipelineError, Result};

/// Extracts the arXiv identifier from an arXiv-minted DOI
/// (`10.48550/arXiv.2301.12345` → `2301.12345`); returns `None` for DOIs
/// minted by any other registrant, since most GEO-linked papers have none.
fn arxiv_id_from_doi(doi: &str) -> Option<String> {
    let lower = doi.to_ascii_lowercase();
    let prefix = "10.48550/arxiv.";
    lower.starts_with(prefix).then(|| doi[prefix.len()..].to_string())
}

/// One enabled source's fan-out call, run concurrently with its siblings.
/// Acquires `limiter`'s per-host permit before calling out, so the same host
/// is never hit by more than `PER_HOST_PERMITS_P2` source calls at once
/// across every paper in flight (§4.4 step 1, §5).
async fn fetch_source(
    store: &Store,
    limiter: &HostLimiter,
    geo_id: &str,
    pmid: &str,
    source: &str,
    call: impl std::future::Future<Output = oracle_sources::Result<Vec<UrlCandidate>>>,
) -> Vec<UrlCandidate> {
    let semaphore = limiter.semaphore_for(source);
    let _permit = semaphore.acquire().await.ok();
    match call.await {
        Ok(urls) => urls,
        Err(e) => {
            let _ = store.log(Stage::P2, geo_id, Some(pmid), LogLevel::Warn, &format!("{source}: {e}"), None, Some(source));
            Vec::new()
        }
    }
}

/// Runs P2 for one publication: fans out to every enabled URL source in
/// parallel, classifies and sorts the merged candidate list, and persists
/// every candidate (§4.4). Accessibility is not checked here — that's P3's
/// job with its own retry budget.
pub async fn run(
    store: &Store,
    clients: &SourceClients,
    config: &OracleConfig,
    limiter: &HostLimiter,
    geo_id: &str,
    publication: &Publication,
) -> Result<Vec<UrlCandidate>> {
    let pmid = publication
        .pmid
        .clone()
        .ok_or_else(|| PipelineError::Extraction("publication has no pmid, cannot collect URLs".to_string()))?;

    let mut candidates: Vec<UrlCandidate> = Vec::new();

    if let Some(pmcid) = &publication.pmcid {
        if config.source_enabled("pmc") {
            candidates.extend(clients.pmc.candidates(pmcid));
        }
    }

    if let Some(doi) = &publication.doi {
        let europepmc = async {
            if !config.source_enabled("europepmc") {
                return Vec::new();
            }
            fetch_source(store, limiter, geo_id, &pmid, "europepmc", clients.europepmc.full_text_urls(doi)).await
        };

        let unpaywall = async {
            if !config.source_enabled("unpaywall") {
                return Vec::new();
            }
            let Some(unpaywall) = &clients.unpaywall else { return Vec::new() };
            fetch_source(store, limiter, geo_id, &pmid, "unpaywall", unpaywall.oa_locations(doi)).await
        };

        let core = async {
            if !config.source_enabled("core") {
                return Vec::new();
            }
            let Some(core) = &clients.core else { return Vec::new() };
            fetch_source(store, limiter, geo_id, &pmid, "core", core.pdf_urls(doi)).await
        };

        let biorxiv = async {
            if !config.source_enabled("biorxiv") {
                return Vec::new();
            }
            let semaphore = limiter.semaphore_for("biorxiv");
            let _permit = semaphore.acquire().await.ok();
            match clients.biorxiv.pdf_url(doi).await {
                Ok(Some(candidate)) => vec![candidate],
                Ok(None) => Vec::new(),
                Err(e) => {
                    let _ = store.log(Stage::P2, geo_id, Some(&pmid), LogLevel::Warn, &format!("biorxiv: {e}"), None, Some("biorxiv"));
                    Vec::new()
                }
            }
        };

        let arxiv = async {
            if !config.source_enabled("arxiv") {
                return Vec::new();
            }
            let Some(arxiv_id) = arxiv_id_from_doi(doi) else { return Vec::new() };
            let semaphore = limiter.semaphore_for("arxiv");
            let _permit = semaphore.acquire().await.ok();
            match clients.arxiv.pdf_url_for_arxiv_id(&arxiv_id).await {
                Ok(candidate) => vec![candidate],
                Err(e) => {
                    let _ = store.log(Stage::P2, geo_id, Some(&pmid), LogLevel::Warn, &format!("arxiv: {e}"), None, Some("arxiv"));
                    Vec::new()
                }
            }
        };

        let crossref = async {
            if !config.source_enabled("crossref") {
                return Vec::new();
            }
            fetch_source(store, limiter, geo_id, &pmid, "crossref", clients.crossref.content_links(doi)).await
        };

        let (europepmc, unpaywall, core, biorxiv, arxiv, crossref) =
            tokio::join!(europepmc, unpaywall, core, biorxiv, arxiv, crossref);
        candidates.extend(europepmc);
        candidates.extend(unpaywall);
        candidates.extend(core);
        candidates.extend(biorxiv);
        candidates.extend(arxiv);
        candidates.extend(crossref);

        candidates.extend(clients.institutional.candidates(doi));

        if clients.alt_sources.is_enabled() {
            candidates.extend(clients.alt_sources.candidates(doi));
        }
    }

    candidates.sort_by_key(|c| sort_key(c.priority, &c.url_type));

    for candidate in &candidates {
        store.add_url(
            geo_id,
            &pmid,
            &candidate.source,
            &candidate.url,
            candidate.url_type.clone(),
            candidate.priority,
            candidate.evidence.as_deref(),
        )?;
    }

    if candidates.is_empty() {
        store.log(Stage::P2, geo_id, Some(&pmid), LogLevel::Warn, "no URLs discovered", None, None)?;
    } else {
        store.log(
            Stage::P2,
            geo_id,
            Some(&pmid),
            LogLevel::Info,
            &format!("collected {} candidate URLs", candidates.len()),
            None,
            None,
        )?;
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_store::UrlType;

    #[test]
    fn sort_key_orders_priority_then_type_rank() {
        let mut candidates = vec![
            UrlCandidate { source: "a".into(), url: "https://a".into(), url_type: UrlType::LandingPage, priority: 0, evidence: None },
            UrlCandidate { source: "b".into(), url: "https://b".into(), url_type: UrlType::PdfDirect, priority: 0, evidence: None },
            UrlCandidate { source: "c".into(), url: "https://c".into(), url_type: UrlType::PdfDirect, priority: 1, evidence: None },
        ];
        candidates.sort_by_key(|c| sort_key(c.priority, &c.url_type));
        assert_eq!(candidates[0].source, "b");
        assert_eq!(candidates[1].source, "a");
        assert_eq!(candidates[2].source, "c");
    }

    #[test]
    fn arxiv_id_from_doi_extracts_id_from_arxiv_minted_doi() {
        assert_eq!(arxiv_id_from_doi("10.48550/arXiv.2301.12345"), Some("2301.12345".to_string()));
        assert_eq!(arxiv_id_from_doi("10.1186/s13059-023-02889-x"), None);
    }
}
