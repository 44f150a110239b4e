use serde::de::DeserializeOwned;

use crate::cache::DiskCache;
use crate::error::{OpenAlexError, Result};
use crate::params::{GetParams, ListParams};
use crate::response::ListResponse;
use crate::types::Work;

const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// Async client for the works-related slice of the
/// [OpenAlex REST API](https://docs.openalex.org) that P1 and P2 need: listing
/// citing works and resolving a single work by OpenAlex ID or DOI.
///
/// The full 23-endpoint client this is grounded on lives at
/// `examples/mmgeorge-papers-mcp/openalex/src/client.rs`; OmicsOracle only
/// ever needs `/works`, so the rest was trimmed (see `DESIGN.md`).
pub struct OpenAlexClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cache: Option<DiskCache>,
}

impl Default for OpenAlexClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAlexClient {
    /// Reads the API key from `OPENALEX_KEY`, if set. The key is optional but
    /// recommended for the "polite pool" (faster, more reliable responses).
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: std::env::var("OPENALEX_KEY").ok(),
            cache: None,
        }
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: Some(api_key.into()),
            cache: None,
        }
    }

    /// Overrides the base URL. Used in tests against a `wiremock` server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Enables disk caching of successful responses, keyed by URL and query
    /// parameters. Off by default — the discovery-level cache above this
    /// client (`oracle_sources::DiscoveryCache`) already covers P1/P2's
    /// repeat-lookup traffic; this is for callers that talk to
    /// `OpenAlexClient` directly.
    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn append_api_key(&self, pairs: &mut Vec<(&str, String)>) {
        if let Some(key) = &self.api_key {
            pairs.push(("api_key", key.clone()));
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, mut query: Vec<(&str, String)>) -> Result<T> {
        self.append_api_key(&mut query);
        let url = format!("{}{}", self.base_url, path);

        if let Some(cache) = &self.cache {
            if let Some(text) = cache.get(&url, &query, None) {
                return serde_json::from_str(&text).map_err(OpenAlexError::Json);
            }
        }

        let resp = self.http.get(&url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAlexError::Api { status: status.as_u16(), message });
        }
        let text = resp.text().await?;
        if let Some(cache) = &self.cache {
            cache.set(&url, &query, None, &text);
        }
        serde_json::from_str(&text).map_err(OpenAlexError::Json)
    }

    /// `GET /works`. Used for citing-papers enumeration via
    /// `filter=cites:{openalex_id}` and for keyword/date-bounded search.
    pub async fn list_works(&self, params: &ListParams) -> Result<ListResponse<Work>> {
        self.get_json("/works", params.to_query_pairs()).await
    }

    /// `GET /works/{id}`. `id` accepts an OpenAlex ID (`W...`), a bare DOI, or
    /// `doi:10.xxxx/...` / `pmid:NNNN` prefixed forms.
    pub async fn get_work(&self, id: &str, params: &GetParams) -> Result<Work> {
        let path = format!("/works/{id}");
        self.get_json(&path, params.to_query_pairs()).await
    }

    /// Convenience wrapper: works citing `openalex_id`, newest first,
    /// `per_page` capped by OpenAlex at 200.
    pub async fn citing_works(&self, openalex_id: &str, per_page: u32) -> Result<ListResponse<Work>> {
        let params = ListParams::builder()
            .filter(format!("cites:{openalex_id}"))
            .sort("publication_date:desc")
            .per_page(per_page)
            .build();
        self.list_works(&params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn citing_works_sends_cites_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {"count": 1, "page": 1, "per_page": 25, "next_cursor": null},
                "results": [{"id": "https://openalex.org/W1", "doi": null, "title": "A citing paper"}],
            })))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new().with_base_url(server.uri());
        let response = client.citing_works("W2741809807", 25).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].best_title(), Some("A citing paper"));
    }

    #[tokio::test]
    async fn get_work_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/W404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = OpenAlexClient::new().with_base_url(server.uri());
        let err = client.get_work("W404", &GetParams::default()).await.unwrap_err();
        assert!(matches!(err, OpenAlexError::Api { status: 404, .. }));
    }
}
