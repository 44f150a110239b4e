use serde::Deserialize;

use crate::error::{Result, SourceError};
use crate::http::{self, HttpTimeouts};
use crate::types::Publication;

const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Client for NCBI E-utilities (`esummary`/`efetch`/`elink`): seed metadata,
/// PubMed detail lookup, and optional PubMed "cited-by" enumeration.
///
/// Requires `email`; `api_key` is optional but lifts the rate limit from 3 to
/// 10 requests/second.
pub struct NcbiClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_key: Option<String>,
}

impl NcbiClient {
    pub fn new(email: impl Into<String>, api_key: Option<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: DEFAULT_BASE_URL.to_string(),
            email: email.into(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn common_params(&self) -> Vec<(&str, String)> {
        let mut params = vec![("email", self.email.clone()), ("retmode", "json".to_string())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Resolves a PMID to DOI + title via `esummary`. P1 step 1 needs the DOI
    /// (or an OpenAlex ID derived from it) before citation queries can run.
    pub async fn resolve_pmid(&self, pmid: &str) -> Result<Publication> {
        let mut params = self.common_params();
        params.push(("db", "pubmed".to_string()));
        params.push(("id", pmid.to_string()));

        let url = format!("{}/esummary.fcgi", self.base_url);
        let resp = self.http.get(&url).query(&params).send().await?;
        http::check_status(&resp)?;
        let body: EsummaryResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;

        let doc = body
            .result
            .and_then(|mut r| r.docs.remove(pmid))
            .ok_or(SourceError::NotFound)?;

        Ok(Publication {
            pmid: Some(pmid.to_string()),
            doi: doc.article_ids.iter().find(|a| a.id_type == "doi").map(|a| a.value.clone()),
            pmcid: doc.article_ids.iter().find(|a| a.id_type == "pmc").map(|a| a.value.clone()),
            title: doc.title.unwrap_or_default(),
            journal: doc.full_journal_name,
            year: doc.pub_date.as_deref().and_then(|d| d.get(0..4)).and_then(|y| y.parse().ok()),
            ..Default::default()
        })
    }

    /// PubMed's own "cited by" relation via `elink` (`cmd=neighbor`,
    /// `linkname=pubmed_pubmed_citedin`). One of the optional fan-out
    /// sources in P1 step 2 alongside OpenAlex/Semantic Scholar.
    pub async fn cited_by(&self, pmid: &str) -> Result<Vec<String>> {
        let mut params = self.common_params();
        params.push(("dbfrom", "pubmed".to_string()));
        params.push(("linkname", "pubmed_pubmed_citedin".to_string()));
        params.push(("id", pmid.to_string()));

        let url = format!("{}/elink.fcgi", self.base_url);
        let resp = self.http.get(&url).query(&params).send().await?;
        http::check_status(&resp)?;
        let body: ElinkResponse = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;

        let ids = body
            .linksets
            .into_iter()
            .flat_map(|ls| ls.linksetdbs)
            .flat_map(|db| db.links)
            .collect();
        Ok(ids)
    }
}

#[derive(Debug, Deserialize)]
struct EsummaryResponse {
    result: Option<EsummaryResult>,
}

#[derive(Debug, Deserialize)]
struct EsummaryResult {
    #[serde(flatten)]
    docs: std::collections::HashMap<String, EsummaryDoc>,
}

#[derive(Debug, Deserialize)]
struct EsummaryDoc {
    title: Option<String>,
    #[serde(rename = "fulljournalname")]
    full_journal_name: Option<String>,
    #[serde(rename = "pubdate")]
    pub_date: Option<String>,
    #[serde(default, rename = "articleids")]
    article_ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "idtype")]
    id_type: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ElinkResponse {
    #[serde(default, rename = "linksets")]
    linksets: Vec<LinkSet>,
}

#[derive(Debug, Deserialize)]
struct LinkSet {
    #[serde(default, rename = "linksetdbs")]
    linksetdbs: Vec<LinkSetDb>,
}

#[derive(Debug, Deserialize)]
struct LinkSetDb {
    #[serde(default)]
    links: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn resolve_pmid_extracts_doi_and_pmcid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {
                    "36927507": {
                        "title": "A GEO companion paper",
                        "fulljournalname": "Genome Biology",
                        "pubdate": "2023 Mar",
                        "articleids": [
                            {"idtype": "doi", "value": "10.1186/s13059-023-02889-x"},
                            {"idtype": "pmc", "value": "PMC10009875"}
                        ]
                    }
                }
            })))
            .mount(&server)
            .await;

        let client = NcbiClient::new("test@example.org", None, HttpTimeouts::default()).with_base_url(server.uri());
        let pub_ = client.resolve_pmid("36927507").await.unwrap();
        assert_eq!(pub_.doi.as_deref(), Some("10.1186/s13059-023-02889-x"));
        assert_eq!(pub_.pmcid.as_deref(), Some("PMC10009875"));
        assert_eq!(pub_.year, Some(2023));
    }

    #[tokio::test]
    async fn resolve_pmid_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": {}})))
            .mount(&server)
            .await;

        let client = NcbiClient::new("test@example.org", None, HttpTimeouts::default()).with_base_url(server.uri());
        let err = client.resolve_pmid("1").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound));
    }
}
