use oracle_store::{ContentType, ExtractionData, LogLevel, PaperType, ScoreComponents, Stage, Store};

fn open_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (store, dir)
}

#[test]
fn upsert_identifier_sets_discovered_and_updated_timestamps() {
    let (store, _dir) = open_store();
    store
        .upsert_identifier("GSE189158", "36927507", None, Some("10.1/x"), "Title", PaperType::Seed)
        .unwrap();
    let first = store.find_identifier("GSE189158", "36927507").unwrap().unwrap();
    assert_eq!(first.first_discovered_at, first.last_updated_at);

    store
        .upsert_identifier("GSE189158", "36927507", Some("PMC123"), None, "Title", PaperType::Seed)
        .unwrap();
    let second = store.find_identifier("GSE189158", "36927507").unwrap().unwrap();
    assert_eq!(second.first_discovered_at, first.first_discovered_at);
    assert_eq!(second.pmcid.as_deref(), Some("PMC123"));
    assert_eq!(second.doi.as_deref(), Some("10.1/x"), "doi preserved via COALESCE");
}

#[test]
fn save_artifact_writes_file_before_db_row_and_dedups_by_hash() {
    let (store, dir) = open_store();
    store
        .upsert_identifier("GSE1", "111", None, None, "t", PaperType::Seed)
        .unwrap();
    store
        .upsert_identifier("GSE1", "222", None, None, "t2", PaperType::Citing)
        .unwrap();

    let bytes = b"%PDF-1.4 same bytes for both papers";
    let (path1, hash1, deduped1) = store
        .save_artifact("GSE1", "111", bytes, ContentType::Pdf, "pmc")
        .unwrap();
    assert!(!deduped1);
    assert!(path1.exists());
    assert!(path1.starts_with(dir.path().join("GSE1").join("pdfs")));

    let (path2, hash2, deduped2) = store
        .save_artifact("GSE1", "222", bytes, ContentType::Pdf, "europepmc")
        .unwrap();
    assert!(deduped2, "identical sha256 must dedup rather than write a second file");
    assert_eq!(hash1, hash2);
    assert_eq!(path1, path2);

    store.verify_artifact("GSE1", "111").unwrap();
    store.verify_artifact("GSE1", "222").unwrap();
}

#[test]
fn verify_artifact_detects_checksum_mismatch() {
    let (store, _dir) = open_store();
    store
        .upsert_identifier("GSE1", "111", None, None, "t", PaperType::Seed)
        .unwrap();
    let (path, _hash, _) = store
        .save_artifact("GSE1", "111", b"%PDF-1.4 original", ContentType::Pdf, "pmc")
        .unwrap();
    std::fs::write(&path, b"corrupted bytes").unwrap();

    let err = store.verify_artifact("GSE1", "111").unwrap_err();
    assert!(matches!(err, oracle_store::StoreError::ChecksumMismatch { .. }));
}

#[test]
fn save_extraction_computes_word_count_when_absent() {
    let (store, _dir) = open_store();
    store
        .upsert_identifier("GSE1", "111", None, None, "t", PaperType::Seed)
        .unwrap();
    let data = ExtractionData {
        full_text: "one two three four".to_string(),
        extraction_method: "pdf".to_string(),
        extraction_quality: 0.9,
        ..Default::default()
    };
    store.save_extraction("GSE1", "111", &data).unwrap();
    let saved = store.find_extraction("GSE1", "111").unwrap().unwrap();
    assert_eq!(saved.word_count, 4);
    assert_eq!(saved.extraction_grade, oracle_store::ExtractionGrade::A);
}

#[test]
fn relevance_score_total_matches_weighted_sum() {
    let (store, _dir) = open_store();
    store
        .upsert_identifier("GSE1", "111", None, None, "t", PaperType::Seed)
        .unwrap();
    let components = ScoreComponents {
        content_sim: 0.5,
        keyword_match: 0.5,
        recency: 0.4,
        citation_component: 0.0,
    };
    let total = 0.5 * 0.4 + 0.5 * 0.3 + 0.4 * 0.2 + 0.0 * 0.1;
    store.save_score("GSE1", "111", &components, total, "v1").unwrap();
    let saved = store.find_score("GSE1", "111").unwrap().unwrap();
    assert!((saved.total - 0.43).abs() < 1e-6);
}

#[test]
fn query_missing_stage_finds_papers_without_urls_or_artifacts() {
    let (store, _dir) = open_store();
    store
        .upsert_identifier("GSE1", "111", None, None, "t", PaperType::Seed)
        .unwrap();
    store
        .upsert_identifier("GSE1", "222", None, None, "t2", PaperType::Citing)
        .unwrap();
    store
        .add_url("GSE1", "111", "pmc", "https://x/pdf", oracle_store::UrlType::PdfDirect, 0, None)
        .unwrap();

    let missing_p2 = store.query_missing_stage("GSE1", Stage::P2).unwrap();
    assert_eq!(missing_p2, vec!["222".to_string()]);
}

#[test]
fn log_appends_and_lists_in_order() {
    let (store, _dir) = open_store();
    store.log(Stage::P1, "GSE1", None, LogLevel::Info, "started", None, None).unwrap();
    store
        .log(Stage::P2, "GSE1", Some("111"), LogLevel::Warn, "no urls", Some(1), Some("unpaywall"))
        .unwrap();
    let entries = store
        .get_connection()
        .with_conn(|conn| oracle_store::repo::ProcessingLogRepo::new(conn).list_for_geo("GSE1"))
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "started");
    assert_eq!(entries[1].source.as_deref(), Some("unpaywall"));
}

#[test]
fn get_complete_geo_data_joins_across_tables() {
    let (store, _dir) = open_store();
    store
        .upsert_identifier("GSE1", "111", None, Some("10.1/a"), "t", PaperType::Seed)
        .unwrap();
    store
        .add_url("GSE1", "111", "pmc", "https://x/pdf", oracle_store::UrlType::PdfDirect, 0, None)
        .unwrap();
    store
        .save_artifact("GSE1", "111", b"%PDF-1.4 body", ContentType::Pdf, "pmc")
        .unwrap();

    let geo = store.get_complete_geo_data("GSE1").unwrap();
    assert_eq!(geo.papers.len(), 1);
    let paper = &geo.papers[0];
    assert_eq!(paper.urls.len(), 1);
    assert!(paper.artifact.is_some());
    assert!(paper.extraction.is_none());
}
