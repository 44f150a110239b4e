use serde::Deserialize;

use crate::classify::classify_url;
use crate::error::{Result, SourceError};
use crate::http::{self, HttpTimeouts};
use crate::types::{Publication, UrlCandidate};

const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

/// Crossref `/works/{doi}` client. Used as the metadata source of last resort
/// when NCBI and OpenAlex both miss (rare, but DOIs outside PubMed's scope —
/// preprints, some society journals — show up this way), and to resolve a
/// bare title back to a DOI when a citing paper record carries no
/// identifiers at all.
pub struct CrossrefClient {
    http: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
}

impl CrossrefClient {
    pub fn new(mailto: Option<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            http: http::build_client(timeouts),
            base_url: DEFAULT_BASE_URL.to_string(),
            mailto,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn mailto_param(&self) -> Vec<(&str, &str)> {
        self.mailto.as_deref().map(|m| vec![("mailto", m)]).unwrap_or_default()
    }

    pub async fn resolve_doi(&self, doi: &str) -> Result<Publication> {
        let url = format!("{}/works/{}", self.base_url, doi);
        let resp = self.http.get(&url).query(&self.mailto_param()).send().await?;
        http::check_status(&resp)?;
        let body: WorkEnvelope = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;
        Ok(body.message.into())
    }

    /// Crossref's `link` array (DOI → content links, §4.2): each element
    /// names a `content-type` and a `URL`; `application/pdf` entries are the
    /// ones worth surfacing as P2 candidates, everything else is `unknown`.
    pub async fn content_links(&self, doi: &str) -> Result<Vec<UrlCandidate>> {
        let url = format!("{}/works/{}", self.base_url, doi);
        let resp = self.http.get(&url).query(&self.mailto_param()).send().await?;
        http::check_status(&resp)?;
        let body: WorkEnvelope = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;

        Ok(body
            .message
            .link
            .into_iter()
            .map(|link| {
                let url_type = if link.content_type.as_deref() == Some("application/pdf") {
                    oracle_store::UrlType::PdfDirect
                } else {
                    classify_url(&link.url)
                };
                UrlCandidate {
                    source: "crossref".to_string(),
                    evidence: link.content_type.clone(),
                    url: link.url,
                    url_type,
                    priority: 3,
                }
            })
            .collect())
    }

    /// Title-based lookup for citing papers whose source record carried no
    /// DOI/PMID, keyed by the top hit's score.
    pub async fn search_by_title(&self, title: &str) -> Result<Option<Publication>> {
        let url = format!("{}/works", self.base_url);
        let mut query = vec![("query.bibliographic", title), ("rows", "1")];
        query.extend(self.mailto_param());
        let resp = self.http.get(&url).query(&query).send().await?;
        http::check_status(&resp)?;
        let body: SearchEnvelope = resp.json().await.map_err(|e| SourceError::Invalid(e.to_string()))?;
        Ok(body.message.items.into_iter().next().map(Into::into))
    }
}

#[derive(Debug, Deserialize)]
struct WorkEnvelope {
    message: Work,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    message: SearchMessage,
}

#[derive(Debug, Deserialize)]
struct SearchMessage {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "is-referenced-by-count")]
    cited_by_count: Option<i64>,
    #[serde(rename = "published-print")]
    published_print: Option<DatePart>,
    #[serde(rename = "published-online")]
    published_online: Option<DatePart>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    #[serde(default)]
    link: Vec<CrossrefLink>,
}

#[derive(Debug, Deserialize)]
struct CrossrefLink {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "content-type")]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatePart {
    #[serde(rename = "date-parts")]
    date_parts: Vec<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
}

impl From<Work> for Publication {
    fn from(w: Work) -> Self {
        let year = w
            .published_print
            .or(w.published_online)
            .and_then(|d| d.date_parts.into_iter().next())
            .and_then(|parts| parts.into_iter().next());

        Publication {
            doi: w.doi,
            title: w.title.into_iter().next().unwrap_or_default(),
            journal: w.container_title.into_iter().next(),
            year,
            citations: w.cited_by_count,
            authors: w
                .author
                .into_iter()
                .map(|a| match (a.given, a.family) {
                    (Some(g), Some(f)) => format!("{g} {f}"),
                    (None, Some(f)) => f,
                    (Some(g), None) => g,
                    (None, None) => String::new(),
                })
                .filter(|n| !n.is_empty())
                .collect(),
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
    async fn resolve_doi_maps_publication_year_and_authors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/10.1/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {
                    "DOI": "10.1/abc",
                    "title": ["Some Work"],
                    "container-title": ["A Journal"],
                    "is-referenced-by-count": 5,
                    "published-print": {"date-parts": [[2021, 6]]},
                    "author": [{"given": "Jane", "family": "Doe"}]
                }
            })))
            .mount(&server)
            .await;

        let client = CrossrefClient::new(Some("test@example.org".into()), HttpTimeouts::default())
            .with_base_url(server.uri());
        let pub_ = client.resolve_doi("10.1/abc").await.unwrap();
        assert_eq!(pub_.year, Some(2021));
        assert_eq!(pub_.authors, vec!["Jane Doe".to_string()]);
        assert_eq!(pub_.citations, Some(5));
    }

    #[tokio::test]
    async fn content_links_marks_pdf_content_type_as_pdf_direct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works/10.1/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {
                    "DOI": "10.1/abc",
                    "link": [
                        {"URL": "https://example.org/full.pdf", "content-type": "application/pdf"},
                        {"URL": "https://example.org/article", "content-type": "text/html"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = CrossrefClient::new(None, HttpTimeouts::default()).with_base_url(server.uri());
        let links = client.content_links("10.1/abc").await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url_type, oracle_store::UrlType::PdfDirect);
    }
}
