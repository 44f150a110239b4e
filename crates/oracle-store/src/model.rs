use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperType {
    Seed,
    Citing,
    Related,
}

impl PaperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperType::Seed => "seed",
            PaperType::Citing => "citing",
            PaperType::Related => "related",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(PaperType::Seed),
            "citing" => Some(PaperType::Citing),
            "related" => Some(PaperType::Related),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlType {
    PdfDirect,
    LandingPage,
    HtmlFulltext,
    DoiResolver,
    Unknown,
}

impl UrlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlType::PdfDirect => "pdf_direct",
            UrlType::LandingPage => "landing_page",
            UrlType::HtmlFulltext => "html_fulltext",
            UrlType::DoiResolver => "doi_resolver",
            UrlType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf_direct" => Some(UrlType::PdfDirect),
            "landing_page" => Some(UrlType::LandingPage),
            "html_fulltext" => Some(UrlType::HtmlFulltext),
            "doi_resolver" => Some(UrlType::DoiResolver),
            "unknown" => Some(UrlType::Unknown),
            _ => None,
        }
    }

    /// Ranking used as the tiebreaker in `(priority asc, url_type rank)` sort.
    pub fn rank(&self) -> u8 {
        match self {
            UrlType::PdfDirect => 0,
            UrlType::HtmlFulltext => 1,
            UrlType::LandingPage => 2,
            UrlType::DoiResolver => 3,
            UrlType::Unknown => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Pdf,
    Html,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Html => "html",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Html => "html",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(ContentType::Pdf),
            "html" => Some(ContentType::Html),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    P1,
    P2,
    P3,
    P4,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::P1 => "P1",
            Stage::P2 => "P2",
            Stage::P3 => "P3",
            Stage::P4 => "P4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExtractionGrade {
    A,
    B,
    C,
    D,
    F,
}

impl ExtractionGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionGrade::A => "A",
            ExtractionGrade::B => "B",
            ExtractionGrade::C => "C",
            ExtractionGrade::D => "D",
            ExtractionGrade::F => "F",
        }
    }

    /// Thresholds pinned per the open question in `SPEC_FULL.md` §9.
    pub fn from_quality(quality: f64) -> Self {
        if quality >= 0.85 {
            ExtractionGrade::A
        } else if quality >= 0.70 {
            ExtractionGrade::B
        } else if quality >= 0.50 {
            ExtractionGrade::C
        } else if quality >= 0.30 {
            ExtractionGrade::D
        } else {
            ExtractionGrade::F
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalIdentifier {
    pub geo_id: String,
    pub pmid: String,
    pub pmcid: Option<String>,
    pub doi: Option<String>,
    pub title: String,
    pub first_discovered_at: String,
    pub last_updated_at: String,
    pub paper_type: PaperType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlDiscovery {
    pub geo_id: String,
    pub pmid: String,
    pub source: String,
    pub url: String,
    pub url_type: UrlType,
    pub priority: i64,
    pub evidence: Option<String>,
    pub discovered_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfArtifact {
    pub geo_id: String,
    pub pmid: String,
    pub pdf_path: String,
    pub pdf_hash_sha256: String,
    pub pdf_size_bytes: i64,
    pub source_used: String,
    pub downloaded_at: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionData {
    pub full_text: String,
    pub abstract_text: Option<String>,
    pub methods: Option<String>,
    pub results: Option<String>,
    pub discussion: Option<String>,
    pub sections_json: Option<String>,
    pub tables_json: Option<String>,
    pub references_json: Option<String>,
    pub word_count: Option<i64>,
    pub extraction_method: String,
    pub extraction_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentExtraction {
    pub geo_id: String,
    pub pmid: String,
    pub full_text: String,
    pub abstract_text: Option<String>,
    pub methods: Option<String>,
    pub results: Option<String>,
    pub discussion: Option<String>,
    pub sections_json: Option<String>,
    pub tables_json: Option<String>,
    pub references_json: Option<String>,
    pub word_count: i64,
    pub extraction_method: String,
    pub extraction_quality: f64,
    pub extraction_grade: ExtractionGrade,
    pub extracted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub content_sim: f64,
    pub keyword_match: f64,
    pub recency: f64,
    pub citation_component: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceScore {
    pub geo_id: String,
    pub pmid: String,
    pub total: f64,
    pub content_sim: f64,
    pub keyword_match: f64,
    pub recency: f64,
    pub citation_component: f64,
    pub weights_version: String,
    pub computed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub id: i64,
    pub geo_id: String,
    pub pmid: Option<String>,
    pub stage: Stage,
    pub source: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub attempt: Option<i64>,
    pub timestamp: String,
}

/// Everything known about a single (geo_id, pmid) pair, joined across tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub identifier: UniversalIdentifier,
    pub urls: Vec<UrlDiscovery>,
    pub artifact: Option<PdfArtifact>,
    pub extraction: Option<ContentExtraction>,
    pub score: Option<RelevanceScore>,
}

/// A GEO series and every paper known about it, for `get_complete_geo_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoData {
    pub geo_id: String,
    pub papers: Vec<PaperRecord>,
}
