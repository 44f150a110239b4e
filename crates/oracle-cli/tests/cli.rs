use oracle_pipeline::{Coordinator, OracleConfig};
use oracle_store::{ContentType, PaperType, Store};
use serial_test::serial;

fn test_config(store_root: &std::path::Path) -> OracleConfig {
    // SAFETY: serialized via `serial_test` so tests never observe a torn env.
    unsafe {
        std::env::set_var("NCBI_EMAIL", "test@example.org");
        std::env::remove_var("ENABLE_SOURCES");
    }
    let mut config = OracleConfig::from_env().unwrap();
    config.store_root = store_root.to_path_buf();
    config
}

#[tokio::test]
#[serial]
async fn cache_stats_reports_zero_before_any_activity() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("store")).unwrap();
    let config = test_config(&dir.path().join("store"));
    let coordinator = Coordinator::new(store, config).unwrap();

    let discovery = coordinator.discovery_cache().stats();
    let parsed = coordinator.parsed_cache().stats();
    assert_eq!(discovery.entries, 0);
    assert_eq!(parsed.entries, 0);
}

#[tokio::test]
#[serial]
async fn cache_cleanup_removes_parsed_entries_unreferenced_by_any_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("store")).unwrap();
    let config = test_config(&dir.path().join("store"));
    let coordinator = Coordinator::new(store, config).unwrap();

    coordinator.parsed_cache().set("kept-hash", &oracle_store::ExtractionData::default()).unwrap();
    coordinator.parsed_cache().set("stale-hash", &oracle_store::ExtractionData::default()).unwrap();

    let keep: std::collections::HashSet<String> = ["kept-hash".to_string()].into_iter().collect();
    let removed = coordinator.parsed_cache().cleanup_unreferenced(&keep);
    assert_eq!(removed, 1);
}

#[tokio::test]
#[serial]
async fn reprocess_p4_parses_a_saved_artifact_and_persists_the_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("store")).unwrap();
    let config = test_config(&dir.path().join("store"));

    store.upsert_identifier("GSE1", "111", None, None, "A GEO companion paper", PaperType::Seed).unwrap();
    let html = b"<!DOCTYPE html><html><body><p>Abstract</p><p>This paper studies a GEO dataset.</p></body></html>";
    store.save_artifact("GSE1", "111", html, ContentType::Html, "test").unwrap();

    let coordinator = Coordinator::new(store, config).unwrap();
    let extraction = coordinator.reprocess_p4("GSE1", "111").await.unwrap();
    assert!(extraction.is_some());
    assert!(coordinator.store().find_extraction("GSE1", "111").unwrap().is_some());
}

#[test]
fn validate_detects_checksum_mismatch_after_artifact_is_corrupted_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("store")).unwrap();

    store.upsert_identifier("GSE2", "222", None, None, "Another paper", PaperType::Seed).unwrap();
    let (path, _hash, _deduped) = store.save_artifact("GSE2", "222", b"%PDF-1.4 original bytes", ContentType::Pdf, "test").unwrap();
    assert!(store.verify_artifact("GSE2", "222").is_ok());

    std::fs::write(&path, b"%PDF-1.4 tampered bytes").unwrap();
    assert!(store.verify_artifact("GSE2", "222").is_err());
}

#[test]
fn get_complete_geo_data_joins_identifier_artifact_and_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("store")).unwrap();

    store.upsert_identifier("GSE3", "333", Some("PMC1"), Some("10.1/x"), "Paper Three", PaperType::Citing).unwrap();
    store.save_artifact("GSE3", "333", b"%PDF-1.4 bytes", ContentType::Pdf, "test").unwrap();

    let data = store.get_complete_geo_data("GSE3").unwrap();
    assert_eq!(data.papers.len(), 1);
    assert_eq!(data.papers[0].identifier.pmid, "333");
    assert!(data.papers[0].artifact.is_some());
    assert!(data.papers[0].extraction.is_none());
}
