use std::path::{Path, PathBuf};
use std::sync::Mutex;

use oracle_store::{ContentExtraction, ContentType, ExtractionData, LogLevel, Stage, Store};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Heading names matched by the section detector (§4.8 step 4), in the
/// ranked order the position heuristic prefers when a heading could match
/// more than one.
const SECTION_HEADINGS: &[(&str, &str)] = &[
    ("abstract", r"(?i)^\s*abstract\s*$"),
    ("introduction", r"(?i)^\s*(1\.?\s*)?introduction\s*$"),
    ("methods", r"(?i)^\s*(\d\.?\s*)?(materials\s+and\s+)?methods?\s*$"),
    ("results", r"(?i)^\s*(\d\.?\s*)?results?\s*$"),
    ("discussion", r"(?i)^\s*(\d\.?\s*)?discussion\s*$"),
    ("conclusion", r"(?i)^\s*(\d\.?\s*)?conclusions?\s*$"),
    ("references", r"(?i)^\s*(references|bibliography)\s*$"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Section {
    name: String,
    start: usize,
    end: usize,
    text: String,
}

/// Extracts raw text from a PDF's bytes page-by-page via `pdf-extract`
/// (§4.8 step 2). `pdf-extract` concatenates pages internally; we keep the
/// resulting string as one page-ordered blob.
fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| PipelineError::Extraction(e.to_string()))
}

/// Strips script/style/nav/header/footer nodes and collects visible text
/// with double-newline section separators (§4.8 step 3).
fn extract_html_text(bytes: &[u8]) -> Result<String> {
    use scraper::{Html, Selector};

    let html = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&html);
    let strip_selector = Selector::parse("script, style, nav, header, footer")
        .expect("static node-stripping selector is always valid");
    let strip_targets: std::collections::HashSet<_> = document
        .select(&strip_selector)
        .flat_map(|el| el.descendants().map(|d| d.id()))
        .collect();

    let mut paragraphs = Vec::new();
    let body_selector = Selector::parse("body").expect("static 'body' selector is always valid");
    let root = document.select(&body_selector).next().unwrap_or_else(|| document.root_element());

    for node in root.descendants() {
        if strip_targets.contains(&node.id()) {
            continue;
        }
        if let Some(text_node) = node.value().as_text() {
            let text = text_node.trim();
            if !text.is_empty() {
                paragraphs.push(text.to_string());
            }
        }
    }

    Ok(paragraphs.join("\n\n"))
}

/// Locates section spans via the ranked regex + position heuristic of §4.8
/// step 4: each line is tested in turn against every heading pattern, first
/// match wins, and a section runs until the next recognized heading.
fn detect_sections(text: &str) -> Vec<Section> {
    let patterns: Vec<(&str, Regex)> = SECTION_HEADINGS
        .iter()
        .map(|(name, pattern)| (*name, Regex::new(pattern).expect("static section heading pattern is valid")))
        .collect();

    let mut headings: Vec<(usize, usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.len() <= 40 {
            for (name, regex) in &patterns {
                if regex.is_match(trimmed) {
                    headings.push((offset, offset + line.len(), name));
                    break;
                }
            }
        }
        offset += line.len() + 1;
    }

    let mut sections = Vec::with_capacity(headings.len());
    for (i, (_start, heading_end, name)) in headings.iter().enumerate() {
        let body_start = *heading_end;
        let body_end = headings.get(i + 1).map(|(s, _, _)| *s).unwrap_or(text.len());
        let body_end = body_end.min(text.len());
        if body_start >= body_end {
            continue;
        }
        sections.push(Section {
            name: name.to_string(),
            start: body_start,
            end: body_end,
            text: text[body_start..body_end].trim().to_string(),
        });
    }
    sections
}

/// Detects the ligature/spacing garbling common to naive PDF text
/// extraction (runs of single characters separated by spaces, e.g. `"T h e"`),
/// used as a negative quality signal.
fn looks_garbled(text: &str) -> bool {
    let sample: String = text.chars().take(2000).collect();
    let single_char_tokens = sample
        .split_whitespace()
        .filter(|tok| tok.chars().count() == 1 && tok.chars().next().is_some_and(|c| c.is_alphabetic()))
        .count();
    let total_tokens = sample.split_whitespace().count().max(1);
    (single_char_tokens as f64 / total_tokens as f64) > 0.3
}

/// Quality score in [0,1] from §4.8 step 5: non-empty sections count, text
/// length, presence of references, absence of garbling.
fn compute_quality(text: &str, sections: &[Section]) -> f64 {
    let non_empty = sections.iter().filter(|s| !s.text.trim().is_empty()).count();
    let section_score = (non_empty as f64 / 5.0).min(1.0);

    let length_score = (text.len() as f64 / 20_000.0).min(1.0);

    let has_references = sections.iter().any(|s| s.name == "references");
    let references_score = if has_references { 1.0 } else { 0.0 };

    let garble_penalty = if looks_garbled(text) { 0.5 } else { 1.0 };

    (0.4 * section_score + 0.3 * length_score + 0.1 * references_score) * garble_penalty
        + if has_references { 0.2 } else { 0.0 }
}

fn section_text<'a>(sections: &'a [Section], name: &str) -> Option<&'a str> {
    sections.iter().find(|s| s.name == name).map(|s| s.text.as_str())
}

/// Keyed on the artifact's SHA-256 (§4.7.2): a re-parse of identical bytes
/// must be an O(1) cache lookup, stored as section JSON under
/// `store_root/cache/parsed/{sha256}.json`.
pub struct ParsedContentCache {
    dir: PathBuf,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

impl ParsedContentCache {
    pub fn open(store_root: impl AsRef<Path>) -> Result<Self> {
        let dir = store_root.as_ref().join("cache").join("parsed");
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, hits: Mutex::new(0), misses: Mutex::new(0) })
    }

    fn path_for(&self, sha256: &str) -> PathBuf {
        self.dir.join(format!("{sha256}.json"))
    }

    pub fn get(&self, sha256: &str) -> Option<ExtractionData> {
        let path = self.path_for(sha256);
        match std::fs::read_to_string(&path).ok().and_then(|s| serde_json::from_str(&s).ok()) {
            Some(data) => {
                *self.hits.lock().unwrap_or_else(|e| e.into_inner()) += 1;
                Some(data)
            }
            None => {
                *self.misses.lock().unwrap_or_else(|e| e.into_inner()) += 1;
                None
            }
        }
    }

    pub fn set(&self, sha256: &str, data: &ExtractionData) -> Result<()> {
        let json = serde_json::to_vec_pretty(data)?;
        std::fs::write(self.path_for(sha256), json)?;
        Ok(())
    }

    pub fn stats(&self) -> oracle_sources::CacheStats {
        let entries = std::fs::read_dir(&self.dir).map(|rd| rd.count() as u64).unwrap_or(0);
        oracle_sources::CacheStats {
            hits: *self.hits.lock().unwrap_or_else(|e| e.into_inner()),
            misses: *self.misses.lock().unwrap_or_else(|e| e.into_inner()),
            entries,
        }
    }

    /// Parsed content has no TTL of its own — it is addressed by content
    /// hash, so `cleanup_expired` here means "remove entries unreferenced by
    /// any artifact", which the caller supplies as a keep-set.
    pub fn cleanup_unreferenced(&self, keep_hashes: &std::collections::HashSet<String>) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else { return 0 };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if !keep_hashes.contains(stem) && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    pub fn invalidate(&self, sha256: &str) -> bool {
        std::fs::remove_file(self.path_for(sha256)).is_ok()
    }

    pub fn clear(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else { return 0 };
        let mut removed = 0;
        for entry in entries.flatten() {
            if std::fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

/// Parses `bytes` into `ExtractionData` without touching the store or cache
/// — the pure parse/score/grade core that both `run` and its tests exercise.
fn parse(bytes: &[u8], content_type: ContentType) -> Result<ExtractionData> {
    let sniff = &bytes[..bytes.len().min(100)];
    let sniff_lower = String::from_utf8_lossy(sniff).to_ascii_lowercase();
    let is_html = content_type == ContentType::Html || sniff_lower.contains("<!doctype") || sniff_lower.contains("<html");

    let (full_text, extraction_method) = if is_html {
        (extract_html_text(bytes)?, "html".to_string())
    } else {
        (extract_pdf_text(bytes)?, "pdf".to_string())
    };

    let sections = detect_sections(&full_text);
    let quality = compute_quality(&full_text, &sections);

    let sections_json = serde_json::to_string(&sections)?;
    let word_count = full_text.split_whitespace().count() as i64;

    Ok(ExtractionData {
        full_text,
        abstract_text: section_text(&sections, "abstract").map(str::to_string),
        methods: section_text(&sections, "methods").map(str::to_string),
        results: section_text(&sections, "results").map(str::to_string),
        discussion: section_text(&sections, "discussion").map(str::to_string),
        sections_json: Some(sections_json),
        tables_json: None,
        references_json: section_text(&sections, "references").map(|t| serde_json::to_string(&[t]).unwrap_or_default()),
        word_count: Some(word_count),
        extraction_method,
        extraction_quality: quality,
    })
}

/// Runs P4 for one paper's artifact: sniffs, parses (or hits the cache),
/// persists `content_extraction` (§4.8). On any extractor failure, records
/// an error log and leaves the row absent rather than propagating.
pub async fn run(store: &Store, cache: &ParsedContentCache, geo_id: &str, pmid: &str) -> Result<Option<ContentExtraction>> {
    let Some(artifact) = store.find_artifact(geo_id, pmid)? else {
        return Ok(None);
    };

    if let Some(cached) = cache.get(&artifact.pdf_hash_sha256) {
        store.save_extraction(geo_id, pmid, &cached)?;
        store.log(Stage::P4, geo_id, Some(pmid), LogLevel::Info, "parsed-content cache hit", None, None)?;
        return Ok(store.find_extraction(geo_id, pmid)?);
    }

    let bytes = std::fs::read(&artifact.pdf_path)?;
    let hash = artifact.pdf_hash_sha256.clone();
    let content_type = artifact.content_type;
    let parsed = tokio::task::spawn_blocking(move || parse(&bytes, content_type))
        .await
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;

    match parsed {
        Ok(data) => {
            cache.set(&hash, &data)?;
            store.save_extraction(geo_id, pmid, &data)?;
            store.log(
                Stage::P4,
                geo_id,
                Some(pmid),
                LogLevel::Info,
                &format!("extracted {} words via {}", data.word_count.unwrap_or(0), data.extraction_method),
                None,
                None,
            )?;
            Ok(store.find_extraction(geo_id, pmid)?)
        }
        Err(e) => {
            store.log(Stage::P4, geo_id, Some(pmid), LogLevel::Error, &format!("extraction failed: {e}"), None, None)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Title Line\n\nAbstract\nThis paper studies things.\n\nMethods\nWe did the study this way.\n\nResults\nWe found results.\n\nDiscussion\nThe results matter.\n\nReferences\n1. Some citation.\n";

    #[test]
    fn detect_sections_finds_standard_headings() {
        let sections = detect_sections(SAMPLE);
        let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["abstract", "methods", "results", "discussion", "references"]);
        assert_eq!(section_text(&sections, "methods"), Some("We did the study this way."));
    }

    #[test]
    fn compute_quality_rewards_full_sections_and_references() {
        let sections = detect_sections(SAMPLE);
        let quality = compute_quality(SAMPLE, &sections);
        assert!(quality > 0.3, "expected meaningful quality score, got {quality}");
    }

    #[test]
    fn compute_quality_is_low_for_empty_text() {
        let sections = detect_sections("");
        let quality = compute_quality("", &sections);
        assert!(quality < 0.2);
    }

    #[test]
    fn looks_garbled_detects_single_character_tokens() {
        assert!(looks_garbled("T h e q u i c k b r o w n f o x j u m p s"));
        assert!(!looks_garbled(SAMPLE));
    }

    #[test]
    fn extract_html_text_strips_script_and_nav() {
        let html = b"<html><body><nav>Menu</nav><script>evil()</script><p>Real content here.</p></body></html>";
        let text = extract_html_text(html).unwrap();
        assert!(text.contains("Real content here."));
        assert!(!text.contains("Menu"));
        assert!(!text.contains("evil"));
    }

    #[test]
    fn parse_dispatches_on_html_sniff_even_when_content_type_is_pdf() {
        let html = b"<!DOCTYPE html><html><body><p>Hello world</p></body></html>";
        let data = parse(html, ContentType::Pdf).unwrap();
        assert_eq!(data.extraction_method, "html");
        assert!(data.full_text.contains("Hello world"));
    }

    #[test]
    fn parsed_content_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParsedContentCache::open(dir.path()).unwrap();
        assert!(cache.get("abc123").is_none());
        let data = ExtractionData {
            full_text: "hello".to_string(),
            extraction_method: "pdf".to_string(),
            extraction_quality: 0.5,
            ..Default::default()
        };
        cache.set("abc123", &data).unwrap();
        let fetched = cache.get("abc123").unwrap();
        assert_eq!(fetched.full_text, "hello");
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn parsed_content_cache_cleanup_unreferenced_removes_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParsedContentCache::open(dir.path()).unwrap();
        let data = ExtractionData::default();
        cache.set("keep", &data).unwrap();
        cache.set("stale", &data).unwrap();
        let keep: std::collections::HashSet<String> = ["keep".to_string()].into_iter().collect();
        let removed = cache.cleanup_unreferenced(&keep);
        assert_eq!(removed, 1);
        assert!(cache.get("keep").is_some());
    }
}
