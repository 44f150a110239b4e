use crate::classify::classify_url;
use crate::types::UrlCandidate;

/// PMC doesn't expose a single "give me the PDF" endpoint; instead §4.4 step 2
/// names four URL patterns to try, in priority order. This client has no
/// network calls of its own — it's pure URL templating, the candidates are
/// verified later by P3's waterfall.
pub struct PmcClient;

impl PmcClient {
    pub fn new() -> Self {
        Self
    }

    /// All four candidate URLs for `pmcid` (e.g. `"PMC11460852"`), sorted
    /// best-first.
    pub fn candidates(&self, pmcid: &str) -> Vec<UrlCandidate> {
        let bare = pmcid.trim_start_matches("PMC");
        let subdir = oa_pdf_subdir(bare);

        let urls = [
            (
                format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/pdf/"),
                0,
                "pmc articles pdf path",
            ),
            (
                format!("https://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_pdf/{subdir}/{pmcid}.pdf"),
                1,
                "pmc open-access FTP mirror",
            ),
            (
                format!("https://europepmc.org/articles/{pmcid}?pdf=render"),
                2,
                "europepmc pdf render",
            ),
            (
                format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/?report=reader"),
                3,
                "pmc html reader, last resort",
            ),
        ];

        urls.into_iter()
            .map(|(url, priority, evidence)| UrlCandidate {
                source: "pmc".to_string(),
                url_type: classify_url(&url),
                url,
                priority,
                evidence: Some(evidence.to_string()),
            })
            .collect()
    }
}

impl Default for PmcClient {
    fn default() -> Self {
        Self::new()
    }
}

/// The FTP OA mirror shards PDFs into two-letter-prefix subdirectories
/// derived from the numeric PMCID, e.g. PMC11460852 -> "bd".
fn oa_pdf_subdir(bare_pmcid: &str) -> String {
    let n: u64 = bare_pmcid.parse().unwrap_or(0);
    let a = (b'a' + ((n / 26) % 26) as u8) as char;
    let b = (b'a' + (n % 26) as u8) as char;
    format!("{a}{b}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_store::UrlType;

    #[test]
    fn generates_all_four_patterns_in_priority_order() {
        let client = PmcClient::new();
        let candidates = client.candidates("PMC11460852");
        assert_eq!(candidates.len(), 4);
        assert!(candidates[0].url.contains("/pmc/articles/PMC11460852/pdf/"));
        assert!(candidates[1].url.contains("oa_pdf"));
        assert!(candidates[2].url.contains("europepmc.org"));
        assert!(candidates[3].url.contains("report=reader"));
        assert_eq!(candidates[0].url_type, UrlType::PdfDirect);
        assert_eq!(candidates[3].url_type, UrlType::LandingPage);
        for (i, c) in candidates.iter().enumerate() {
            assert_eq!(c.priority, i as i64);
        }
    }
}
