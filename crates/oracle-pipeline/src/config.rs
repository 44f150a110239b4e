use std::time::Duration;

use oracle_sources::clients::InstitutionalRepo;
use oracle_sources::{HttpTimeouts, RetryPolicy};

use crate::error::{PipelineError, Result};

/// Process-wide configuration, loaded once from environment variables (§6)
/// and validated before any network or store I/O happens. Invalid or missing
/// required values are an **Input error** — exit code 2, no partial state.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub ncbi_email: String,
    pub ncbi_api_key: Option<String>,
    pub unpaywall_email: Option<String>,
    pub core_api_key: Option<String>,
    pub semantic_scholar_key: Option<String>,
    pub store_root: std::path::PathBuf,
    pub http_timeouts: HttpTimeouts,
    pub retry_policy: RetryPolicy,
    pub per_url_max_retries: u32,
    pub per_url_retry_delay: Duration,
    pub pdf_min_bytes: usize,
    pub discovery_cache_ttl: Duration,
    pub enabled_sources: Vec<String>,
    pub max_papers_per_geo: Option<usize>,
    pub institutional_repos: Vec<InstitutionalRepo>,
}

const ALL_OPEN_SOURCES: &[&str] = &[
    "ncbi", "openalex", "semantic_scholar", "pmc", "europepmc", "unpaywall", "crossref", "core",
    "biorxiv", "arxiv",
];

impl OracleConfig {
    /// Loads and validates configuration from the process environment.
    /// `NCBI_EMAIL` is the only strictly required variable; everything else
    /// has a typed default.
    pub fn from_env() -> Result<Self> {
        let ncbi_email = require_env("NCBI_EMAIL")?;

        let store_root = std::env::var("STORE_ROOT")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| std::path::PathBuf::from("./oracle-store-data"));

        let http_timeouts = HttpTimeouts {
            connect: Duration::from_secs_f64(parse_env_or("HTTP_TIMEOUT_CONNECT_S", 5.0)?),
            read: Duration::from_secs_f64(parse_env_or("HTTP_TIMEOUT_READ_S", 30.0)?),
        };

        let retry_policy = RetryPolicy {
            max_retries: parse_env_or("RETRY_MAX", 3u32)?,
            base_delay: Duration::from_secs_f64(parse_env_or("RETRY_BASE_DELAY_S", 1.0)?),
            mult: parse_env_or("RETRY_MULT", 2.0)?,
            jitter: parse_env_or("RETRY_JITTER", 0.25)?,
            max_delay: Duration::from_secs(30),
        };

        let enabled_sources = match std::env::var("ENABLE_SOURCES") {
            Ok(raw) => raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            Err(_) => ALL_OPEN_SOURCES.iter().map(|s| s.to_string()).collect(),
        };

        let max_papers_per_geo = match std::env::var("MAX_PAPERS_PER_GEO") {
            Ok(raw) => {
                let n: usize = raw.parse().map_err(|_| PipelineError::Config("MAX_PAPERS_PER_GEO must be an integer".into()))?;
                if n == 0 { None } else { Some(n) }
            }
            Err(_) => None,
        };

        let institutional_repos = match std::env::var("INSTITUTIONAL_REPOS") {
            Ok(raw) => oracle_sources::clients::institutional::parse_repo_list(&raw),
            Err(_) => Vec::new(),
        };

        Ok(Self {
            ncbi_email,
            ncbi_api_key: optional_env("NCBI_API_KEY"),
            unpaywall_email: optional_env("UNPAYWALL_EMAIL"),
            core_api_key: optional_env("CORE_API_KEY"),
            semantic_scholar_key: optional_env("SEMANTIC_SCHOLAR_KEY"),
            store_root,
            http_timeouts,
            retry_policy,
            per_url_max_retries: parse_env_or("PER_URL_MAX_RETRIES", 2u32)?,
            per_url_retry_delay: Duration::from_secs_f64(parse_env_or("PER_URL_RETRY_DELAY_S", 1.5)?),
            pdf_min_bytes: parse_env_or("PDF_MIN_BYTES", 1024usize)?,
            discovery_cache_ttl: Duration::from_secs(parse_env_or("DISCOVERY_CACHE_TTL_S", 604_800u64)?),
            enabled_sources,
            max_papers_per_geo,
            institutional_repos,
        })
    }

    pub fn source_enabled(&self, name: &str) -> bool {
        self.enabled_sources.iter().any(|s| s == name)
    }

    /// Shadow mirrors are never on unless `ENABLE_SOURCES` explicitly names
    /// `altsource` (§9 open question).
    pub fn alt_sources_enabled(&self) -> bool {
        self.enabled_sources.iter().any(|s| s == "altsource")
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| PipelineError::Config(format!("{key} environment variable not set")))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| PipelineError::Config(format!("{key} could not be parsed"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_requires_ncbi_email() {
        // SAFETY: serialized via `serial_test` so no other test observes a
        // torn env var state.
        unsafe { std::env::remove_var("NCBI_EMAIL") };
        let err = OracleConfig::from_env().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    #[serial]
    fn from_env_fills_defaults() {
        unsafe {
            std::env::set_var("NCBI_EMAIL", "test@example.org");
            std::env::remove_var("RETRY_MAX");
            std::env::remove_var("ENABLE_SOURCES");
        }
        let config = OracleConfig::from_env().unwrap();
        assert_eq!(config.ncbi_email, "test@example.org");
        assert_eq!(config.retry_policy.max_retries, 3);
        assert!(config.source_enabled("openalex"));
        assert!(!config.alt_sources_enabled());
        unsafe { std::env::remove_var("NCBI_EMAIL") };
    }
}
