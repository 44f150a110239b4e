use serde::Deserialize;

use crate::error::{Result, SourceError};
use crate::http::{self, HttpTimeouts};
use crate::types::Publication;

const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const FIELDS: &str = "title,abstract,year,venue,citationCount,externalIds,authors.name";

/// Semantic Scholar Graph API client. Free tier, ~100 rps; `api_key` lifts
/// the rate limit when provided. Adds citing-paper coverage alongside
/// OpenAlex in P1 step 2.
pub struct SemanticScholarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        req
    }

    /// Papers citing the work identified by `doi` (accepts a bare DOI or a
    /// Semantic Scholar paper ID).
    pub async fn citing(&self, doi: &str) -> Result<Vec<Publication>> {
        let url = format!("{}/paper/DOI:{}/citations", self.base_url, doi);
        let resp = self
            .request(&url)
            .query(&[("fields", FIELDS), ("limit", "100")])
            .send()
            .await?;
        http::check_status(&resp)?;
        let body: CitationsResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;
        Ok(body.data.into_iter().map(|c| c.citing_paper.into()).collect())
    }
}

#[derive(Debug, Deserialize)]
struct CitationsResponse {
    #[serde(default)]
    data: Vec<CitationEdge>,
}

#[derive(Debug, Deserialize)]
struct CitationEdge {
    #[serde(rename = "citingPaper")]
    citing_paper: Paper,
}

#[derive(Debug, Deserialize)]
struct Paper {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    venue: Option<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<i64>,
    #[serde(rename = "externalIds", default)]
    external_ids: ExternalIds,
    #[serde(default)]
    authors: Vec<Author>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalIds {
    #[serde(rename = "PubMed")]
    pubmed: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "PubMedCentral")]
    pmc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

impl From<Paper> for Publication {
    fn from(p: Paper) -> Self {
        Publication {
            pmid: p.external_ids.pubmed,
            doi: p.external_ids.doi,
            pmcid: p.external_ids.pmc,
            title: p.title.unwrap_or_default(),
            abstract_text: p.abstract_text,
            journal: p.venue,
            year: p.year,
            citations: p.citation_count,
            authors: p.authors.into_iter().filter_map(|a| a.name).collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn citing_maps_external_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/DOI:10.1/x/citations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "citingPaper": {
                        "title": "A citing paper",
                        "year": 2024,
                        "citationCount": 2,
                        "externalIds": {"PubMed": "111", "DOI": "10.1/z"}
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = SemanticScholarClient::new(None, HttpTimeouts::default()).with_base_url(server.uri());
        let results = client.citing("10.1/x").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pmid.as_deref(), Some("111"));
    }
}
