use serde::Deserialize;

/// A location where a work is available: publisher page, repository mirror,
/// or preprint server.
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub is_oa: Option<bool>,
    pub landing_page_url: Option<String>,
    pub pdf_url: Option<String>,
    pub source: Option<DehydratedSource>,
    pub license: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DehydratedSource {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub host_organization_name: Option<String>,
    pub r#type: Option<String>,
}

/// Open-access status information for a work.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccess {
    pub is_oa: Option<bool>,
    pub oa_status: Option<String>,
    pub oa_url: Option<String>,
}

/// An author's contribution to a work.
#[derive(Debug, Clone, Deserialize)]
pub struct Authorship {
    pub author_position: Option<String>,
    pub author: Option<DehydratedAuthor>,
    pub raw_author_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DehydratedAuthor {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub orcid: Option<String>,
}

/// A keyword extracted from the work, used by P1's relevance scorer for
/// `keyword_match`.
#[derive(Debug, Clone, Deserialize)]
pub struct Keyword {
    pub keyword: Option<String>,
    pub score: Option<f64>,
}

/// A biomedical MeSH term (PubMed-indexed works only).
#[derive(Debug, Clone, Deserialize)]
pub struct MeshTerm {
    pub descriptor_name: Option<String>,
    pub qualifier_name: Option<String>,
    pub is_major_topic: Option<bool>,
}

/// External identifiers for a [`crate::Work`].
#[derive(Debug, Clone, Deserialize)]
pub struct WorkIds {
    pub openalex: Option<String>,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
}
