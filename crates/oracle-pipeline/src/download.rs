use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use oracle_sources::{SourceError, UrlCandidate};
use oracle_store::{ContentType, LogLevel, Stage, Store, UrlType};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::OracleConfig;
use crate::error::Result;

const PDF_MAGIC: &[u8] = b"%PDF-";
const HTML_MIN_BYTES: usize = 2_048;

/// Outcome of running the waterfall for one paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { source: String, content_type: ContentType, deduped: bool },
    AlreadyPresent,
    Exhausted,
    Cancelled,
}

/// Per-host semaphore table shared across a run, so downloads (P3) or source
/// API calls (P2, keyed by source name as a proxy for host) from the same
/// place are bounded regardless of which paper or candidate issued them.
#[derive(Clone, Default)]
pub struct HostLimiter {
    limits: Arc<std::sync::Mutex<HashMap<String, Arc<Semaphore>>>>,
    permits_per_host: usize,
}

impl HostLimiter {
    pub fn new(permits_per_host: usize) -> Self {
        Self { limits: Arc::new(std::sync::Mutex::new(HashMap::new())), permits_per_host }
    }

    pub fn semaphore_for(&self, host: &str) -> Arc<Semaphore> {
        let mut limits = self.limits.lock().unwrap_or_else(|e| e.into_inner());
        limits
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.permits_per_host.max(1))))
            .clone()
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= PDF_MAGIC.len() && &bytes[..PDF_MAGIC.len()] == PDF_MAGIC
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_ascii_lowercase();
    head.contains("<!doctype") || head.contains("<html")
}

/// Scans a landing page's `<a>`/`<meta>` tags for a link to an actual PDF,
/// resolved against the page's own URL.
fn find_pdf_link(html: &str, base_url: &str) -> Option<String> {
    use scraper::{Html, Selector};

    let document = Html::parse_document(html);
    let base = url::Url::parse(base_url).ok()?;

    let meta_selector = Selector::parse(r#"meta[name="citation_pdf_url"]"#).ok()?;
    if let Some(meta) = document.select(&meta_selector).next() {
        if let Some(content) = meta.value().attr("content") {
            if let Ok(resolved) = base.join(content) {
                return Some(resolved.to_string());
            }
        }
    }

    let link_selector = Selector::parse("a[href]").ok()?;
    for link in document.select(&link_selector) {
        let Some(href) = link.value().attr("href") else { continue };
        let lower = href.to_ascii_lowercase();
        if lower.ends_with(".pdf") || lower.contains("/pdf/") || lower.contains("pdf=render") {
            if let Ok(resolved) = base.join(href) {
                return Some(resolved.to_string());
            }
        }
    }
    None
}

async fn fetch_once(http: &reqwest::Client, url: &str, timeouts: oracle_sources::HttpTimeouts) -> std::result::Result<(reqwest::StatusCode, Vec<u8>, Option<u64>), SourceError> {
    let response = http
        .get(url)
        .timeout(timeouts.read)
        .send()
        .await
        .map_err(SourceError::from)?;
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if !status.is_success() {
        return Err(SourceError::from_status(status, retry_after));
    }
    let bytes = response.bytes().await.map_err(SourceError::from)?.to_vec();
    Ok((status, bytes, retry_after))
}

/// Runs P3 for one paper: walks the candidate URL list in priority order,
/// retrying each URL up to `per_url_max_retries` times, until a valid
/// artifact is produced or every candidate is exhausted (§4.5).
pub async fn run(
    store: &Store,
    http: &reqwest::Client,
    config: &OracleConfig,
    limiter: &HostLimiter,
    cancel: &CancellationToken,
    geo_id: &str,
    pmid: &str,
    mut candidates: Vec<UrlCandidate>,
) -> Result<DownloadOutcome> {
    if let Some(artifact) = store.find_artifact(geo_id, pmid)? {
        if store.verify_artifact(geo_id, pmid).is_ok() {
            store.log(Stage::P3, geo_id, Some(pmid), LogLevel::Info, "artifact already present, skipping download", None, Some(&artifact.source_used))?;
            return Ok(DownloadOutcome::AlreadyPresent);
        }
    }

    let mut html_fallback: Option<(String, Vec<u8>)> = None;
    let mut index = 0;
    while index < candidates.len() {
        if cancel.is_cancelled() {
            store.log(Stage::P3, geo_id, Some(pmid), LogLevel::Warn, "cancelled mid-waterfall", None, None)?;
            return Ok(DownloadOutcome::Cancelled);
        }

        let candidate = candidates[index].clone();
        let host = host_of(&candidate.url);
        let semaphore = limiter.semaphore_for(&host);
        let _permit = semaphore.acquire().await.ok();

        let mut last_err: Option<SourceError> = None;
        let mut succeeded = false;

        for attempt in 1..=config.per_url_max_retries.max(1) {
            match fetch_once(http, &candidate.url, config.http_timeouts).await {
                Ok((_status, bytes, retry_after)) => {
                    if looks_like_pdf(&bytes) {
                        if bytes.len() >= config.pdf_min_bytes {
                            let (_path, _hash, deduped) = store.save_artifact(geo_id, pmid, &bytes, ContentType::Pdf, &candidate.source)?;
                            store.log(Stage::P3, geo_id, Some(pmid), LogLevel::Info, &format!("downloaded pdf via {}", candidate.source), Some(attempt as i64), Some(&candidate.source))?;
                            return Ok(DownloadOutcome::Downloaded { source: candidate.source, content_type: ContentType::Pdf, deduped });
                        }
                        last_err = Some(SourceError::Invalid("pdf smaller than minimum byte threshold".to_string()));
                        break;
                    }

                    if looks_like_html(&bytes) {
                        let html = String::from_utf8_lossy(&bytes).to_string();
                        if let Some(pdf_url) = find_pdf_link(&html, &candidate.url) {
                            candidates.push(UrlCandidate {
                                source: format!("{}_landing_page", candidate.source),
                                url: pdf_url,
                                url_type: UrlType::PdfDirect,
                                priority: candidate.priority,
                                evidence: Some(format!("extracted from landing page {}", candidate.url)),
                            });
                        } else if bytes.len() >= HTML_MIN_BYTES && html_fallback.is_none() {
                            html_fallback = Some((candidate.source.clone(), bytes));
                        }
                        succeeded = true;
                        break;
                    }

                    last_err = Some(SourceError::Invalid("response was neither pdf nor html".to_string()));
                    break;
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    last_err = Some(e);
                    if !retryable || attempt == config.per_url_max_retries.max(1) {
                        break;
                    }
                    tokio::time::sleep(config.per_url_retry_delay + Duration::from_millis((attempt as u64) * 100)).await;
                }
            }
        }

        if let Some(e) = last_err {
            store.log(Stage::P3, geo_id, Some(pmid), LogLevel::Warn, &format!("{} failed: {e}", candidate.source), None, Some(&candidate.source))?;
        }
        let _ = succeeded;
        index += 1;
    }

    if let Some((source, bytes)) = html_fallback {
        let (_path, _hash, deduped) = store.save_artifact(geo_id, pmid, &bytes, ContentType::Html, &source)?;
        store.log(Stage::P3, geo_id, Some(pmid), LogLevel::Info, &format!("no pdf available, persisted html fallback via {source}"), None, Some(&source))?;
        return Ok(DownloadOutcome::Downloaded { source, content_type: ContentType::Html, deduped });
    }

    store.log(Stage::P3, geo_id, Some(pmid), LogLevel::Error, "all candidate urls exhausted without a valid artifact", None, None)?;
    Ok(DownloadOutcome::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_like_pdf_requires_exact_magic_bytes() {
        assert!(looks_like_pdf(b"%PDF-1.7 rest of file"));
        assert!(!looks_like_pdf(b"<html><body>not a pdf</body></html>"));
        assert!(!looks_like_pdf(b"%PD"));
    }

    #[test]
    fn looks_like_html_detects_doctype_and_html_tag() {
        assert!(looks_like_html(b"<!DOCTYPE html><html></html>"));
        assert!(looks_like_html(b"<html lang=\"en\">"));
        assert!(!looks_like_html(b"%PDF-1.4"));
    }

    #[test]
    fn find_pdf_link_prefers_citation_meta_tag() {
        let html = r#"<html><head><meta name="citation_pdf_url" content="/files/paper.pdf"></head></html>"#;
        let link = find_pdf_link(html, "https://example.org/articles/1").unwrap();
        assert_eq!(link, "https://example.org/files/paper.pdf");
    }

    #[test]
    fn find_pdf_link_falls_back_to_anchor_tags() {
        let html = r#"<html><body><a href="/download/fulltext.pdf">PDF</a></body></html>"#;
        let link = find_pdf_link(html, "https://example.org/landing").unwrap();
        assert_eq!(link, "https://example.org/download/fulltext.pdf");
    }

    #[test]
    fn find_pdf_link_returns_none_without_any_pdf_hint() {
        let html = "<html><body><p>nothing here</p></body></html>";
        assert!(find_pdf_link(html, "https://example.org/landing").is_none());
    }

    #[test]
    fn host_of_extracts_host_from_url() {
        assert_eq!(host_of("https://www.ncbi.nlm.nih.gov/pmc/x"), "www.ncbi.nlm.nih.gov");
        assert_eq!(host_of("not a url"), "unknown");
    }
}
