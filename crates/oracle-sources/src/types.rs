use oracle_store::UrlType;
use serde::{Deserialize, Serialize};

/// A publication as known to the pipeline, independent of which source
/// produced it. `citation_client.citing` and `url_client.fetch_candidate`
/// both operate on this shape (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publication {
    pub pmid: Option<String>,
    pub doi: Option<String>,
    pub pmcid: Option<String>,
    pub openalex_id: Option<String>,
    pub title: String,
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub citations: Option<i64>,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub mesh_terms: Vec<String>,
}

impl Publication {
    /// Canonical dedup key precedence from §4.3 step 3: PMID > DOI > title.
    /// Returns `None` only when none of the three are available, which
    /// should not happen for anything that made it out of a citation client.
    pub fn dedup_key(&self) -> Option<DedupKey> {
        if let Some(pmid) = &self.pmid {
            return Some(DedupKey::Pmid(pmid.clone()));
        }
        if let Some(doi) = &self.doi {
            return Some(DedupKey::Doi(normalize_doi(doi)));
        }
        if !self.title.trim().is_empty() {
            return Some(DedupKey::Title(normalize_title(&self.title)));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Pmid(String),
    Doi(String),
    Title(String),
}

pub fn normalize_doi(doi: &str) -> String {
    doi.trim()
        .trim_start_matches("https://doi.org/")
        .trim_start_matches("http://doi.org/")
        .to_ascii_lowercase()
}

/// Lowercase, whitespace-collapse, punctuation-strip — the normalization the
/// spec names for title-based dedup (§4.3 step 3, §9 open question: we pin
/// prefix-match similarity over "fuzzy" as the one implementation).
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_ascii_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_space = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

/// A candidate full-text URL surfaced by a P2 source, before classification
/// and priority sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlCandidate {
    pub source: String,
    pub url: String,
    pub url_type: UrlType,
    pub priority: i64,
    pub evidence: Option<String>,
}

/// Output of `P1 Citation Discovery`'s composition over one seed paper
/// (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub original_paper: Publication,
    pub citing_papers: Vec<ScoredPublication>,
    pub sources_used: Vec<String>,
    pub cache_status: CacheStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    Hit,
    Miss,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPublication {
    pub publication: Publication,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_prefers_pmid_over_doi_and_title() {
        let pub_ = Publication {
            pmid: Some("123".into()),
            doi: Some("10.1/x".into()),
            title: "Some Title".into(),
            ..Default::default()
        };
        assert_eq!(pub_.dedup_key(), Some(DedupKey::Pmid("123".into())));
    }

    #[test]
    fn normalize_title_collapses_whitespace_and_punctuation() {
        assert_eq!(
            normalize_title("The  Effect, of X (2020)!"),
            "the effect of x 2020"
        );
    }

    #[test]
    fn normalize_doi_strips_url_prefix() {
        assert_eq!(normalize_doi("https://doi.org/10.1186/ABC"), "10.1186/abc");
    }
}
