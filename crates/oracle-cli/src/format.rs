use oracle_pipeline::RunSummary;
use oracle_sources::CacheStats;
use oracle_store::GeoData;

fn stage_line(name: &str, attempted: usize, succeeded: usize, failed: usize) -> String {
    format!("  {name:<4} {succeeded}/{attempted} succeeded · {failed} failed\n")
}

pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = format!("{} · {} papers discovered\n", summary.geo_id, summary.papers_discovered);
    out.push_str(&stage_line("P2", summary.p2.attempted, summary.p2.succeeded, summary.p2.failed));
    out.push_str(&stage_line("P3", summary.p3.attempted, summary.p3.succeeded, summary.p3.failed));
    out.push_str(&stage_line("P4", summary.p4.attempted, summary.p4.succeeded, summary.p4.failed));
    out
}

pub fn format_geo_data(data: &GeoData) -> String {
    let mut out = format!("{} · {} papers\n", data.geo_id, data.papers.len());
    for (i, paper) in data.papers.iter().enumerate() {
        let id = &paper.identifier;
        out.push_str(&format!("\n {:>2}  {} ({})\n", i + 1, id.title, id.paper_type.as_str()));
        out.push_str(&format!("     PMID {}", id.pmid));
        if let Some(doi) = &id.doi {
            out.push_str(&format!(" · DOI {doi}"));
        }
        out.push('\n');

        if !paper.urls.is_empty() {
            out.push_str(&format!("     {} url(s) collected\n", paper.urls.len()));
        }
        if let Some(artifact) = &paper.artifact {
            out.push_str(&format!(
                "     artifact: {} ({} bytes, sha256 {}…)\n",
                artifact.content_type.as_str(),
                artifact.pdf_size_bytes,
                &artifact.pdf_hash_sha256[..12.min(artifact.pdf_hash_sha256.len())],
            ));
        }
        if let Some(extraction) = &paper.extraction {
            out.push_str(&format!(
                "     extraction: grade {} · {} words\n",
                extraction.extraction_grade.as_str(),
                extraction.word_count,
            ));
        }
        if let Some(score) = &paper.score {
            out.push_str(&format!("     relevance: {:.3}\n", score.total));
        }
    }
    out
}

pub fn format_cache_stats(discovery: &CacheStats, parsed: &CacheStats) -> String {
    format!(
        "discovery cache: {} entries · {} hits · {} misses · {:.0}% hit rate\n\
         parsed cache:    {} entries · {} hits · {} misses · {:.0}% hit rate\n",
        discovery.entries,
        discovery.hits,
        discovery.misses,
        discovery.hit_rate() * 100.0,
        parsed.entries,
        parsed.hits,
        parsed.misses,
        parsed.hit_rate() * 100.0,
    )
}

pub fn format_reprocess_result(geo_id: &str, stage: &str, attempted: usize, succeeded: usize) -> String {
    format!("{geo_id} · {stage} reprocessed: {succeeded}/{attempted} succeeded\n")
}

pub fn format_validate_result(geo_id: &str, checked: usize, mismatches: &[String], rescored: usize) -> String {
    let mut out = format!("{geo_id} · {checked} artifact(s) checked, {} mismatch(es)\n", mismatches.len());
    for pmid in mismatches {
        out.push_str(&format!("  CHECKSUM MISMATCH: PMID {pmid}\n"));
    }
    if rescored > 0 {
        out.push_str(&format!("  {rescored} score(s) recomputed\n"));
    }
    out
}
