use serde::Deserialize;

use crate::classify::classify_url;
use crate::error::{Result, SourceError};
use crate::http::{self, HttpTimeouts};
use crate::types::UrlCandidate;

const DEFAULT_BASE_URL: &str = "https://api.core.ac.uk/v3";

/// CORE (core.ac.uk) aggregates repository and publisher OA copies beyond
/// what Unpaywall indexes. Requires an API key (free tier). Used as a
/// fallback source in P2 when Unpaywall and Europe PMC both come up empty.
pub struct CoreClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CoreClient {
    pub fn new(api_key: impl Into<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub async fn pdf_urls(&self, doi: &str) -> Result<Vec<UrlCandidate>> {
        let url = format!("{}/search/works", self.base_url);
        let query = format!("doi:\"{doi}\"");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("q", query.as_str()), ("limit", "3")])
            .send()
            .await?;
        http::check_status(&resp)?;
        let body: SearchResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| {
                let url = r.download_url.or(r.source_fulltext_urls.into_iter().next())?;
                Some(UrlCandidate {
                    source: "core".to_string(),
                    url_type: classify_url(&url),
                    url,
                    priority: i as i64,
                    evidence: Some("core.ac.uk aggregated repository copy".to_string()),
                })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CoreWork>,
}

#[derive(Debug, Deserialize)]
struct CoreWork {
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
    #[serde(rename = "sourceFulltextUrls", default)]
    source_fulltext_urls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn pdf_urls_prefers_download_url_over_source_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/works"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "downloadUrl": "https://core.ac.uk/download/12345.pdf",
                    "sourceFulltextUrls": ["https://repo.example.org/12345"]
                }]
            })))
            .mount(&server)
            .await;

        let client = CoreClient::new("test-key", HttpTimeouts::default()).with_base_url(server.uri());
        let urls = client.pdf_urls("10.1/x").await.unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].url, "https://core.ac.uk/download/12345.pdf");
    }
}
