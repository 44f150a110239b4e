use oracle_openalex::{GetParams, OpenAlexClient as RawOpenAlexClient, OpenAlexError, Work};

use crate::error::{Result, SourceError};
use crate::types::Publication;

/// Wraps [`oracle_openalex::OpenAlexClient`] as a P1 citation source and a P2
/// OA-location source (`best_oa_location`/`primary_location` both carry PDF
/// URLs OpenAlex already resolved).
pub struct OpenAlexSource {
    client: RawOpenAlexClient,
}

impl Default for OpenAlexSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAlexSource {
    pub fn new() -> Self {
        Self { client: RawOpenAlexClient::new() }
    }

    #[cfg(test)]
    fn with_base_url(url: impl Into<String>) -> Self {
        Self { client: RawOpenAlexClient::new().with_base_url(url) }
    }

    /// Resolves DOI/PMID to an OpenAlex work, needed before citing-works
    /// enumeration can run (§4.3 step 1).
    pub async fn resolve(&self, doi: &str) -> Result<Publication> {
        let id = format!("https://doi.org/{}", doi.trim_start_matches("https://doi.org/"));
        let work = self
            .client
            .get_work(&id, &GetParams::default())
            .await
            .map_err(map_err)?;
        Ok(work_to_publication(&work))
    }

    /// Papers citing `openalex_id` (P1 step 2).
    pub async fn citing(&self, openalex_id: &str) -> Result<Vec<Publication>> {
        let response = self.client.citing_works(openalex_id, 100).await.map_err(map_err)?;
        Ok(response.results.iter().map(work_to_publication).collect())
    }
}

fn work_to_publication(work: &Work) -> Publication {
    Publication {
        pmid: work.pmid(),
        doi: work.doi.as_deref().map(|d| d.trim_start_matches("https://doi.org/").to_string()),
        pmcid: work.ids.as_ref().and_then(|i| i.pmcid.clone()),
        openalex_id: Some(work.id.clone()),
        title: work.best_title().unwrap_or_default().to_string(),
        abstract_text: work.reconstruct_abstract(),
        journal: work
            .primary_location
            .as_ref()
            .and_then(|l| l.source.as_ref())
            .and_then(|s| s.display_name.clone()),
        year: work.publication_year,
        citations: work.cited_by_count,
        authors: work
            .authorships
            .as_ref()
            .map(|a| a.iter().filter_map(|a| a.raw_author_name.clone()).collect())
            .unwrap_or_default(),
        keywords: work
            .keywords
            .as_ref()
            .map(|ks| ks.iter().filter_map(|k| k.keyword.clone()).collect())
            .unwrap_or_default(),
        mesh_terms: work
            .mesh
            .as_ref()
            .map(|ms| ms.iter().filter_map(|m| m.descriptor_name.clone()).collect())
            .unwrap_or_default(),
    }
}

fn map_err(err: OpenAlexError) -> SourceError {
    match err {
        OpenAlexError::Http(e) => e.into(),
        OpenAlexError::Json(e) => SourceError::Invalid(e.to_string()),
        OpenAlexError::Api { status, message } => {
            let status = reqwest::StatusCode::from_u16(status).unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            let _ = message;
            SourceError::from_status(status, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn citing_maps_works_to_publications() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/works$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {"count": 1, "page": 1, "per_page": 25, "next_cursor": null},
                "results": [{
                    "id": "https://openalex.org/W1",
                    "doi": "https://doi.org/10.1/y",
                    "title": "Citing paper",
                    "ids": {"pmid": "https://pubmed.ncbi.nlm.nih.gov/999"},
                    "cited_by_count": 3
                }],
            })))
            .mount(&server)
            .await;

        let source = OpenAlexSource::with_base_url(server.uri());
        let results = source.citing("W2741809807").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pmid.as_deref(), Some("999"));
        assert_eq!(results[0].citations, Some(3));
    }
}
