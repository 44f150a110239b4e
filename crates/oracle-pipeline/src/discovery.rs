use futures::stream::{self, StreamExt};
use oracle_sources::{CacheStatus, DedupKey, DiscoveryResult, Publication, ScoredPublication};
use oracle_store::{LogLevel, PaperType, Stage, Store};

use crate::clients::SourceClients;
use crate::config::OracleConfig;
use crate::error::Result;
use crate::scoring::{self, GeoContext, PaperContext};

/// Seeds resolved and fanned out concurrently (§5: "P1 ~8 papers in flight").
const P1_CONCURRENCY: usize = 8;

/// Seed input to P1 (§4.3): a GEO series and the PubMed IDs named in its
/// record.
#[derive(Debug, Clone)]
pub struct GeoSeriesMetadata {
    pub geo_id: String,
    pub pubmed_ids: Vec<String>,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
}

/// Resolves one seed PMID to a full publication record via NCBI, falling
/// back to Europe PMC if NCBI is unavailable (both are metadata-only
/// lookups, no citation fan-out yet).
async fn resolve_seed(clients: &SourceClients, config: &OracleConfig, pmid: &str) -> Option<Publication> {
    let cache_key = format!("pmid:{pmid}");
    if let Some(cached) = clients.discovery_cache.get("ncbi_resolve", &cache_key) {
        if let Ok(pub_) = serde_json::from_str::<Publication>(&cached) {
            return Some(pub_);
        }
    }

    let result = config
        .retry_policy
        .retry(|_attempt| clients.ncbi.resolve_pmid(pmid))
        .await;

    match result {
        Ok(pub_) => {
            if let Ok(json) = serde_json::to_string(&pub_) {
                clients.discovery_cache.set("ncbi_resolve", &cache_key, &json);
            }
            Some(pub_)
        }
        Err(_) => clients.europepmc.resolve_pmid(pmid).await.ok(),
    }
}

/// Resolves the seed's OpenAlex work ID from its DOI, needed before
/// citing-works enumeration can run.
async fn resolve_openalex_id(clients: &SourceClients, config: &OracleConfig, doi: &str) -> Option<String> {
    config
        .retry_policy
        .retry(|_attempt| clients.openalex.resolve(doi))
        .await
        .ok()
        .and_then(|p| p.openalex_id)
}

/// Fans out to every enabled citation source for one seed, in parallel
/// (§4.3 step 2). A source that errors contributes nothing but never fails
/// the overall discovery.
async fn fan_out_citations(
    clients: &SourceClients,
    config: &OracleConfig,
    seed: &Publication,
) -> (Vec<Publication>, Vec<String>) {
    let (openalex, semantic_scholar, ncbi) = tokio::join!(
        fan_out_openalex(clients, config, seed),
        fan_out_semantic_scholar(clients, config, seed),
        fan_out_ncbi(clients, config, seed),
    );

    let mut all = Vec::new();
    let mut sources_used = Vec::new();
    for (papers, source) in [openalex, semantic_scholar, ncbi].into_iter().flatten() {
        sources_used.push(source);
        all.extend(papers);
    }
    (all, sources_used)
}

async fn fan_out_openalex(clients: &SourceClients, config: &OracleConfig, seed: &Publication) -> Option<(Vec<Publication>, String)> {
    if !config.source_enabled("openalex") {
        return None;
    }
    let openalex_id = seed.openalex_id.as_ref()?;
    let cache_key = format!("openalex_id:{openalex_id}");
    let cached = clients.discovery_cache.get("openalex_citing", &cache_key);
    let citing = if let Some(json) = cached {
        serde_json::from_str::<Vec<Publication>>(&json).ok()
    } else {
        let result = config.retry_policy.retry(|_| clients.openalex.citing(openalex_id)).await.ok();
        if let Some(ref papers) = result {
            if let Ok(json) = serde_json::to_string(papers) {
                clients.discovery_cache.set("openalex_citing", &cache_key, &json);
            }
        }
        result
    };
    citing.map(|papers| (papers, "openalex".to_string()))
}

async fn fan_out_semantic_scholar(clients: &SourceClients, config: &OracleConfig, seed: &Publication) -> Option<(Vec<Publication>, String)> {
    if !config.source_enabled("semantic_scholar") {
        return None;
    }
    let doi = seed.doi.as_ref()?;
    let cache_key = format!("doi:{doi}");
    let cached = clients.discovery_cache.get("semantic_scholar_citing", &cache_key);
    let citing = if let Some(json) = cached {
        serde_json::from_str::<Vec<Publication>>(&json).ok()
    } else {
        let result = config.retry_policy.retry(|_| clients.semantic_scholar.citing(doi)).await.ok();
        if let Some(ref papers) = result {
            if let Ok(json) = serde_json::to_string(papers) {
                clients.discovery_cache.set("semantic_scholar_citing", &cache_key, &json);
            }
        }
        result
    };
    citing.map(|papers| (papers, "semantic_scholar".to_string()))
}

async fn fan_out_ncbi(clients: &SourceClients, config: &OracleConfig, seed: &Publication) -> Option<(Vec<Publication>, String)> {
    if !config.source_enabled("ncbi") {
        return None;
    }
    let pmid = seed.pmid.as_ref()?;
    let ids = config.retry_policy.retry(|_| clients.ncbi.cited_by(pmid)).await.ok()?;
    if ids.is_empty() {
        return None;
    }
    let papers = ids.into_iter().map(|id| Publication { pmid: Some(id), ..Default::default() }).collect();
    Some((papers, "ncbi_cited_by".to_string()))
}

/// Deduplicates citing papers by the precedence of §4.3 step 3: PMID > DOI >
/// normalized title. Orthogonal fields from later duplicates fill gaps in
/// the kept record (richest-metadata-wins merge).
fn dedupe(papers: Vec<Publication>) -> Vec<Publication> {
    let mut seen: Vec<(DedupKey, Publication)> = Vec::new();
    for paper in papers {
        let Some(key) = paper.dedup_key() else { continue };
        if let Some((_, existing)) = seen.iter_mut().find(|(k, _)| keys_match(k, &key)) {
            merge_into(existing, paper);
        } else {
            seen.push((key, paper));
        }
    }
    seen.into_iter().map(|(_, p)| p).collect()
}

/// PMID and DOI keys match on exact equality; title keys match on the
/// normalized-prefix similarity pinned in SPEC_FULL.md §9, since two sources
/// rarely report byte-identical titles for the same paper.
fn keys_match(a: &DedupKey, b: &DedupKey) -> bool {
    match (a, b) {
        (DedupKey::Pmid(x), DedupKey::Pmid(y)) => x == y,
        (DedupKey::Doi(x), DedupKey::Doi(y)) => x == y,
        (DedupKey::Title(x), DedupKey::Title(y)) => title_similarity(x, y) >= 0.9,
        _ => false,
    }
}

/// Compares the shorter of two normalized titles as a prefix of the longer,
/// via `strsim::normalized_levenshtein` over the shared-length window. Lets
/// "...in mice" or a trailing subtitle fail to break a match while still
/// rejecting genuinely different titles that happen to share a stem.
fn title_similarity(a: &str, b: &str) -> f64 {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.is_empty() {
        return if longer.is_empty() { 1.0 } else { 0.0 };
    }
    let window = &longer[..shorter.len()];
    strsim::normalized_levenshtein(shorter, window)
}

fn merge_into(existing: &mut Publication, other: Publication) {
    if existing.doi.is_none() {
        existing.doi = other.doi;
    }
    if existing.pmcid.is_none() {
        existing.pmcid = other.pmcid;
    }
    if existing.openalex_id.is_none() {
        existing.openalex_id = other.openalex_id;
    }
    if existing.title.trim().is_empty() {
        existing.title = other.title;
    }
    if existing.abstract_text.is_none() {
        existing.abstract_text = other.abstract_text;
    }
    if existing.journal.is_none() {
        existing.journal = other.journal;
    }
    if existing.year.is_none() {
        existing.year = other.year;
    }
    if existing.citations.is_none() || other.citations.unwrap_or(0) > existing.citations.unwrap_or(0) {
        existing.citations = other.citations.or(existing.citations);
    }
    if existing.authors.is_empty() {
        existing.authors = other.authors;
    }
    if existing.keywords.is_empty() {
        existing.keywords = other.keywords;
    }
    if existing.mesh_terms.is_empty() {
        existing.mesh_terms = other.mesh_terms;
    }
}

fn age_years(paper_year: Option<i32>, current_year: i32) -> f64 {
    match paper_year {
        Some(y) => (current_year - y).max(0) as f64,
        None => 10.0,
    }
}

/// Runs P1 for one GEO series: resolve seeds, fan out to citation sources,
/// dedupe, score, and persist (§4.3). Seeds are processed concurrently,
/// bounded by `P1_CONCURRENCY` (§5). Never fails outright if at least one
/// seed resolves.
pub async fn run(
    store: &Store,
    clients: &SourceClients,
    config: &OracleConfig,
    geo: &GeoSeriesMetadata,
    current_year: i32,
) -> Result<Vec<DiscoveryResult>> {
    let results: Vec<Result<Option<DiscoveryResult>>> = stream::iter(geo.pubmed_ids.iter())
        .map(|seed_pmid| async move { process_seed(store, clients, config, geo, seed_pmid, current_year).await })
        .buffer_unordered(P1_CONCURRENCY)
        .collect()
        .await;

    let mut out = Vec::with_capacity(results.len());
    for result in results {
        if let Some(discovery_result) = result? {
            out.push(discovery_result);
        }
    }
    Ok(out)
}

/// Resolves, fans out, dedupes, scores, and persists one seed PMID. Returns
/// `None` when the seed itself could not be resolved from any source.
async fn process_seed(
    store: &Store,
    clients: &SourceClients,
    config: &OracleConfig,
    geo: &GeoSeriesMetadata,
    seed_pmid: &str,
    current_year: i32,
) -> Result<Option<DiscoveryResult>> {
    let seed = match resolve_seed(clients, config, seed_pmid).await {
        Some(seed) => seed,
        None => {
            store.log(Stage::P1, &geo.geo_id, Some(seed_pmid), LogLevel::Error, "failed to resolve seed from any source", None, None)?;
            return Ok(None);
        }
    };

    store.upsert_identifier(
        &geo.geo_id,
        seed_pmid,
        seed.pmcid.as_deref(),
        seed.doi.as_deref(),
        &seed.title,
        PaperType::Seed,
    )?;

    let Some(doi) = seed.doi.clone() else {
        store.log(Stage::P1, &geo.geo_id, Some(seed_pmid), LogLevel::Info, "seed has no DOI, skipping citation discovery", None, None)?;
        return Ok(Some(DiscoveryResult {
            original_paper: seed,
            citing_papers: Vec::new(),
            sources_used: Vec::new(),
            cache_status: CacheStatus::Miss,
        }));
    };

    let mut seed = seed;
    if seed.openalex_id.is_none() {
        seed.openalex_id = resolve_openalex_id(clients, config, &doi).await;
    }

    let (citing_raw, sources_used) = fan_out_citations(clients, config, &seed).await;
    let cache_status = if sources_used.is_empty() { CacheStatus::Miss } else { CacheStatus::Hit };
    let citing = dedupe(citing_raw);

    let geo_ctx = GeoContext {
        title: &geo.title,
        summary: &geo.summary,
        keywords: &geo.keywords,
    };

    let mut scored = Vec::with_capacity(citing.len());
    for paper in citing {
        let paper_ctx = PaperContext {
            title: &paper.title,
            abstract_text: paper.abstract_text.as_deref(),
            keywords: &paper.keywords,
            mesh_terms: &paper.mesh_terms,
            age_years: age_years(paper.year, current_year),
            citations: paper.citations.unwrap_or(0),
        };
        let (_components, total) = scoring::score(&geo_ctx, &paper_ctx);

        if let Some(pmid) = &paper.pmid {
            store.upsert_identifier(
                &geo.geo_id,
                pmid,
                paper.pmcid.as_deref(),
                paper.doi.as_deref(),
                &paper.title,
                PaperType::Citing,
            )?;
        }

        scored.push(ScoredPublication { publication: paper, score: total });
    }
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    store.log(
        Stage::P1,
        &geo.geo_id,
        Some(seed_pmid),
        LogLevel::Info,
        &format!("discovered {} citing papers from {} sources", scored.len(), sources_used.len()),
        None,
        None,
    )?;

    Ok(Some(DiscoveryResult {
        original_paper: seed,
        citing_papers: scored,
        sources_used,
        cache_status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_sources::normalize_title;

    #[test]
    fn dedupe_prefers_pmid_and_merges_missing_fields() {
        let a = Publication {
            pmid: Some("1".into()),
            title: "A Paper".into(),
            journal: None,
            ..Default::default()
        };
        let b = Publication {
            pmid: Some("1".into()),
            title: "".into(),
            journal: Some("Nature".into()),
            ..Default::default()
        };
        let deduped = dedupe(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].title, "A Paper");
        assert_eq!(deduped[0].journal.as_deref(), Some("Nature"));
    }

    #[test]
    fn dedupe_falls_back_to_doi_then_title() {
        let a = Publication { doi: Some("10.1/x".into()), title: "X".into(), ..Default::default() };
        let b = Publication { doi: Some("10.1/x".into()), title: "Y".into(), ..Default::default() };
        let c = Publication { title: "Some Unique Title".into(), ..Default::default() };
        let deduped = dedupe(vec![a, b, c]);
        assert_eq!(deduped.len(), 2);
    }

    /// Pinned vector for the §9 title-dedup algorithm: a subtitle/trailing
    /// clause appended by one source must still merge with the bare title
    /// reported by another, while an unrelated title stays separate.
    #[test]
    fn dedupe_merges_titles_with_trailing_clause_via_prefix_similarity() {
        let a = Publication {
            title: "Widespread transcriptional silencing in aging tissue".into(),
            journal: Some("Nature".into()),
            ..Default::default()
        };
        let b = Publication {
            title: "Widespread transcriptional silencing in aging tissue, revisited in mice".into(),
            citations: Some(4),
            ..Default::default()
        };
        let unrelated = Publication {
            title: "A completely different study of coral reef microbiomes".into(),
            ..Default::default()
        };
        let deduped = dedupe(vec![a, b, unrelated]);
        assert_eq!(deduped.len(), 2);
        let merged = deduped.iter().find(|p| p.journal.as_deref() == Some("Nature")).unwrap();
        assert_eq!(merged.citations, Some(4));
    }

    #[test]
    fn title_similarity_matches_prefix_and_rejects_unrelated() {
        let a = normalize_title("Widespread transcriptional silencing in aging tissue");
        let b = normalize_title("Widespread transcriptional silencing in aging tissue, revisited in mice");
        assert!(title_similarity(&a, &b) >= 0.9);

        let c = normalize_title("A completely different study of coral reef microbiomes");
        assert!(title_similarity(&a, &c) < 0.9);
    }

    #[test]
    fn age_years_defaults_to_ten_when_year_unknown() {
        assert_eq!(age_years(None, 2026), 10.0);
        assert_eq!(age_years(Some(2020), 2026), 6.0);
    }
}
