use crate::classify::classify_url;
use crate::types::UrlCandidate;

/// Higher than any legitimate source's priority value (§4.4 callers use
/// small per-source-local ranks), so the shadow mirror always sorts last.
const LAST_RESORT_PRIORITY: i64 = 1000;

/// Shadow-library mirrors (Sci-Hub and similar). Disabled unless an operator
/// explicitly opts in by naming `altsource` in `ENABLE_SOURCES` (§6) —
/// legally murky in most jurisdictions, so the coordinator must never reach
/// for this source on its own. When enabled it's the last entry in P3's
/// waterfall, after every legitimate source has been exhausted.
pub struct AltSourcesClient {
    enabled: bool,
    mirror_base_url: String,
}

impl AltSourcesClient {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            mirror_base_url: "https://sci-hub.se".to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_base_url = url.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns no candidates unless explicitly enabled, regardless of input.
    pub fn candidates(&self, doi: &str) -> Vec<UrlCandidate> {
        if !self.enabled {
            return Vec::new();
        }
        let url = format!("{}/{}", self.mirror_base_url, doi);
        vec![UrlCandidate {
            source: "shadow_mirror".to_string(),
            url_type: classify_url(&url),
            url,
            // Priority is otherwise a per-source-local rank (each source's own
            // candidates start at 0), so this must be higher than any legitimate
            // source's priority to actually sort last in the merged waterfall.
            priority: LAST_RESORT_PRIORITY,
            evidence: Some("operator-enabled shadow mirror, last resort".to_string()),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_returns_no_candidates() {
        let client = AltSourcesClient::new(false);
        assert!(client.candidates("10.1/x").is_empty());
    }

    #[test]
    fn enabled_returns_one_candidate() {
        let client = AltSourcesClient::new(true).with_base_url("https://mirror.example.org");
        let candidates = client.candidates("10.1/x");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://mirror.example.org/10.1/x");
    }

    #[test]
    fn sorts_after_every_legitimate_source_priority() {
        use crate::classify::sort_key;
        use oracle_store::UrlType;

        let client = AltSourcesClient::new(true).with_base_url("https://mirror.example.org");
        let shadow = &client.candidates("10.1/x")[0];
        let legitimate = UrlCandidate {
            source: "crossref".to_string(),
            url: "https://example.org/legit.pdf".to_string(),
            url_type: UrlType::PdfDirect,
            priority: 3,
            evidence: None,
        };
        assert!(sort_key(shadow.priority, &shadow.url_type) > sort_key(legitimate.priority, &legitimate.url_type));
    }
}
