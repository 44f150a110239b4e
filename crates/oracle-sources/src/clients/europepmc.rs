use serde::Deserialize;

use crate::classify::classify_url;
use crate::error::{Result, SourceError};
use crate::http::{self, HttpTimeouts};
use crate::types::{Publication, UrlCandidate};

const DEFAULT_BASE_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

/// Europe PMC REST client. Covers preprints and EU-funded OA articles that
/// NCBI's PMC mirror doesn't carry, and exposes a `fullTextUrlList` that often
/// names a direct PDF even when PMC itself only has an HTML reader.
pub struct EuropePmcClient {
    http: reqwest::Client,
    base_url: String,
}

impl EuropePmcClient {
    pub fn new(timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Looks up a publication by DOI and returns whatever full-text URLs
    /// Europe PMC lists for it.
    pub async fn full_text_urls(&self, doi: &str) -> Result<Vec<UrlCandidate>> {
        let url = format!("{}/search", self.base_url);
        let query = format!("DOI:\"{doi}\"");
        let resp = self
            .http
            .get(&url)
            .query(&[("query", query.as_str()), ("format", "json")])
            .send()
            .await?;
        http::check_status(&resp)?;
        let body: SearchResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;

        let Some(result) = body.result_list.result.into_iter().next() else {
            return Ok(Vec::new());
        };

        Ok(result
            .full_text_url_list
            .map(|list| list.full_text_url)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, u)| UrlCandidate {
                source: "europepmc".to_string(),
                url_type: classify_url(&u.url),
                url: u.url,
                priority: i as i64,
                evidence: Some(format!("europepmc {} ({})", u.document_style.unwrap_or_default(), u.availability.unwrap_or_default())),
            })
            .collect())
    }

    /// Resolves a PMID to a [`Publication`], used as a fallback identity
    /// source when NCBI is rate-limited.
    pub async fn resolve_pmid(&self, pmid: &str) -> Result<Publication> {
        let url = format!("{}/search", self.base_url);
        let query = format!("EXT_ID:{pmid} AND SRC:MED");
        let resp = self
            .http
            .get(&url)
            .query(&[("query", query.as_str()), ("format", "json")])
            .send()
            .await?;
        http::check_status(&resp)?;
        let body: SearchResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;
        let result = body.result_list.result.into_iter().next().ok_or(SourceError::NotFound)?;

        Ok(Publication {
            pmid: Some(pmid.to_string()),
            doi: result.doi,
            pmcid: result.pmcid,
            title: result.title.unwrap_or_default(),
            journal: result.journal_title,
            year: result.pub_year.and_then(|y| y.parse().ok()),
            citations: result.cited_by_count,
            ..Default::default()
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultList")]
    result_list: ResultList,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    doi: Option<String>,
    pmcid: Option<String>,
    title: Option<String>,
    #[serde(rename = "journalTitle")]
    journal_title: Option<String>,
    #[serde(rename = "pubYear")]
    pub_year: Option<String>,
    #[serde(rename = "citedByCount")]
    cited_by_count: Option<i64>,
    #[serde(rename = "fullTextUrlList")]
    full_text_url_list: Option<FullTextUrlList>,
}

#[derive(Debug, Deserialize)]
struct FullTextUrlList {
    #[serde(rename = "fullTextUrl", default)]
    full_text_url: Vec<FullTextUrl>,
}

#[derive(Debug, Deserialize)]
struct FullTextUrl {
    #[serde(rename = "documentStyle")]
    document_style: Option<String>,
    availability: Option<String>,
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn full_text_urls_classifies_each_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultList": {
                    "result": [{
                        "doi": "10.1/x",
                        "fullTextUrlList": {
                            "fullTextUrl": [
                                {"documentStyle": "pdf", "availability": "Open access", "url": "https://europepmc.org/articles/PMC1?pdf=render"},
                                {"documentStyle": "html", "availability": "Open access", "url": "https://europepmc.org/articles/PMC1"}
                            ]
                        }
                    }]
                }
            })))
            .mount(&server)
            .await;

        let client = EuropePmcClient::new(HttpTimeouts::default()).with_base_url(server.uri());
        let urls = client.full_text_urls("10.1/x").await.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].priority, 0);
    }

    #[tokio::test]
    async fn resolve_pmid_not_found_when_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultList": {"result": []}
            })))
            .mount(&server)
            .await;

        let client = EuropePmcClient::new(HttpTimeouts::default()).with_base_url(server.uri());
        let err = client.resolve_pmid("999").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound));
    }
}
