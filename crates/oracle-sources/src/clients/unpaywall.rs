use serde::Deserialize;

use crate::classify::classify_url;
use crate::error::{Result, SourceError};
use crate::http::{self, HttpTimeouts};
use crate::types::UrlCandidate;

const DEFAULT_BASE_URL: &str = "https://api.unpaywall.org/v2";

/// Unpaywall lookup by DOI. Requires a contact email per their terms; no API
/// key. This is usually the cheapest, most reliable OA-location source in
/// P2's waterfall (§4.4 step 1).
pub struct UnpaywallClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
}

impl UnpaywallClient {
    pub fn new(email: impl Into<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: DEFAULT_BASE_URL.to_string(),
            email: email.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// OA locations for `doi`, best location first, the rest following in the
    /// order Unpaywall reports them.
    pub async fn oa_locations(&self, doi: &str) -> Result<Vec<UrlCandidate>> {
        let url = format!("{}/{}", self.base_url, doi);
        let resp = self.http.get(&url).query(&[("email", &self.email)]).send().await?;
        http::check_status(&resp)?;
        let body: UnpaywallResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;

        if !body.is_oa {
            return Ok(Vec::new());
        }

        let mut locations = Vec::new();
        if let Some(best) = body.best_oa_location {
            locations.push(best);
        }
        locations.extend(body.oa_locations);

        Ok(locations
            .into_iter()
            .enumerate()
            .filter_map(|(i, loc)| {
                let url = loc.url_for_pdf.or(loc.url)?;
                Some(UrlCandidate {
                    source: "unpaywall".to_string(),
                    url_type: classify_url(&url),
                    url,
                    priority: i as i64,
                    evidence: Some(format!("unpaywall {} ({})", loc.host_type.unwrap_or_default(), loc.license.unwrap_or_default())),
                })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct UnpaywallResponse {
    #[serde(rename = "is_oa")]
    is_oa: bool,
    #[serde(rename = "best_oa_location")]
    best_oa_location: Option<OaLocation>,
    #[serde(default, rename = "oa_locations")]
    oa_locations: Vec<OaLocation>,
}

#[derive(Debug, Deserialize)]
struct OaLocation {
    url: Option<String>,
    #[serde(rename = "url_for_pdf")]
    url_for_pdf: Option<String>,
    #[serde(rename = "host_type")]
    host_type: Option<String>,
    license: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn oa_locations_returns_empty_when_not_open_access() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/10.1/closed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"is_oa": false})))
            .mount(&server)
            .await;

        let client = UnpaywallClient::new("test@example.org", HttpTimeouts::default()).with_base_url(server.uri());
        let locations = client.oa_locations("10.1/closed").await.unwrap();
        assert!(locations.is_empty());
    }

    #[tokio::test]
    async fn oa_locations_puts_best_location_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/10.1/open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "is_oa": true,
                "best_oa_location": {"url_for_pdf": "https://example.org/best.pdf", "host_type": "publisher", "license": "cc-by"},
                "oa_locations": [{"url_for_pdf": "https://example.org/mirror.pdf", "host_type": "repository"}]
            })))
            .mount(&server)
            .await;

        let client = UnpaywallClient::new("test@example.org", HttpTimeouts::default()).with_base_url(server.uri());
        let locations = client.oa_locations("10.1/open").await.unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].url, "https://example.org/best.pdf");
        assert_eq!(locations[0].priority, 0);
    }
}
