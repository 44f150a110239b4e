mod extraction;
mod identifier;
mod log;
mod pdf_artifact;
mod score;
mod url_discovery;

pub use extraction::ContentExtractionRepo;
pub use identifier::UniversalIdentifierRepo;
pub use log::ProcessingLogRepo;
pub use pdf_artifact::PdfArtifactRepo;
pub use score::RelevanceScoreRepo;
pub use url_discovery::UrlDiscoveryRepo;
