use serde::Deserialize;

use crate::classify::classify_url;
use crate::error::{Result, SourceError};
use crate::http::{self, HttpTimeouts};
use crate::types::UrlCandidate;

const BIORXIV_BASE_URL: &str = "https://api.biorxiv.org/details/biorxiv";
const ARXIV_BASE_URL: &str = "http://export.arxiv.org/api/query";

/// bioRxiv/medRxiv details API. Many GEO-linked papers are deposited as
/// preprints before (or instead of) journal publication; bioRxiv serves the
/// PDF directly from a predictable `/content/.../vN.full.pdf` path once the
/// DOI resolves to a preprint record.
pub struct BiorxivClient {
    http: reqwest::Client,
    base_url: String,
}

impl BiorxivClient {
    pub fn new(timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: BIORXIV_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub async fn pdf_url(&self, doi: &str) -> Result<Option<UrlCandidate>> {
        let url = format!("{}/{}", self.base_url, doi);
        let resp = self.http.get(&url).send().await?;
        http::check_status(&resp)?;
        let body: DetailsResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;

        let Some(latest) = body.collection.into_iter().last() else {
            return Ok(None);
        };
        let pdf_url = format!(
            "https://www.biorxiv.org/content/{}v{}.full.pdf",
            latest.doi, latest.version
        );
        Ok(Some(UrlCandidate {
            source: "biorxiv".to_string(),
            url_type: classify_url(&pdf_url),
            url: pdf_url,
            priority: 0,
            evidence: Some(format!("biorxiv preprint v{}", latest.version)),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    collection: Vec<PreprintRecord>,
}

#[derive(Debug, Deserialize)]
struct PreprintRecord {
    doi: String,
    version: String,
}

/// arXiv Atom API. Matches by DOI in the `arxiv:doi_relation` extension
/// element; arXiv PDFs live at a stable `/pdf/{id}` path with no version
/// probing needed (the abstract page always redirects to the latest).
pub struct ArxivClient {
    http: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: ARXIV_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub async fn pdf_url_for_arxiv_id(&self, arxiv_id: &str) -> Result<UrlCandidate> {
        // arXiv IDs are already stable identifiers, no lookup round trip
        // needed; the search endpoint is only used to confirm existence.
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("id_list", arxiv_id), ("max_results", "1")])
            .send()
            .await?;
        http::check_status(&resp)?;
        let body = resp.text().await.map_err(|e| SourceError::Invalid(e.to_string()))?;
        if !body.contains(arxiv_id) {
            return Err(SourceError::NotFound);
        }
        let pdf_url = format!("https://arxiv.org/pdf/{arxiv_id}");
        Ok(UrlCandidate {
            source: "arxiv".to_string(),
            url_type: classify_url(&pdf_url),
            url: pdf_url,
            priority: 0,
            evidence: Some("arxiv stable pdf path".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn biorxiv_pdf_url_uses_latest_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/details/biorxiv/10.1101/2021.01.01.000001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "collection": [
                    {"doi": "10.1101/2021.01.01.000001", "version": "1"},
                    {"doi": "10.1101/2021.01.01.000001", "version": "2"}
                ]
            })))
            .mount(&server)
            .await;

        let client = BiorxivClient::new(HttpTimeouts::default()).with_base_url(format!("{}/details/biorxiv", server.uri()));
        let candidate = client.pdf_url("10.1101/2021.01.01.000001").await.unwrap().unwrap();
        assert!(candidate.url.ends_with("v2.full.pdf"));
    }

    #[tokio::test]
    async fn biorxiv_returns_none_for_unknown_doi() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/details/biorxiv/10.1/nope"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"collection": []})))
            .mount(&server)
            .await;

        let client = BiorxivClient::new(HttpTimeouts::default()).with_base_url(format!("{}/details/biorxiv", server.uri()));
        assert!(client.pdf_url("10.1/nope").await.unwrap().is_none());
    }
}
