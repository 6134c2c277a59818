//! End-to-end scenarios exercising the full Engine surface: ingest,
//! search, context inflation, and snapshot round-trip.

use engine_core::config::{EngineConfig, InflatorConfig};
use engine_core::ingest::IngestStatus;
use engine_core::model::Provenance;
use engine_core::Engine;

fn engine_in(dir: &std::path::Path) -> Engine {
    let config = EngineConfig {
        watched_dir: dir.join("watched"),
        db_path: dir.join("context.db"),
        backups_dir: dir.join("backups"),
        models_dir: dir.join("models"),
        max_file_bytes: 100 * 1024 * 1024,
        fts_base_k: 500,
        inflator: InflatorConfig::default(),
    };
    std::fs::create_dir_all(&config.backups_dir).unwrap();
    Engine::boot(config).expect("engine boots")
}

#[test]
fn s1_ingest_then_search_hit() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine_in(tmp.path());

    let outcome = engine
        .ingest("The ECE stores memory in a graph.", Some("a.md"), None, Some(vec!["notes".into()]))
        .expect("ingest succeeds");
    assert_eq!(outcome.status, IngestStatus::Inserted);

    let result = engine
        .search("ECE", Some(vec!["notes".into()]), 500, "all")
        .expect("search succeeds");

    assert_eq!(result.results.len(), 1);
    assert!(result.results[0].score > 0.0);
    assert_eq!(result.results[0].source, "a.md");
    assert!(result.context.contains("ECE"));
}

#[test]
fn s2_duplicate_ingest_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine_in(tmp.path());

    let first = engine
        .ingest("repeated body", Some("dup.md"), None, None)
        .expect("first ingest succeeds");
    assert_eq!(first.status, IngestStatus::Inserted);

    let second = engine
        .ingest("repeated body", Some("dup.md"), None, None)
        .expect("second ingest succeeds");
    assert_eq!(second.status, IngestStatus::Skipped);
    assert_eq!(second.id, first.id);
}

#[test]
fn s3_bucket_isolation() {
    // Dedup keys on content hash alone (spec Open Question resolution:
    // dedup is a global content property, not per-bucket), so the two
    // records here carry distinct content to land as separate compounds -
    // the caller-side workaround the same resolution documents.
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine_in(tmp.path());

    engine
        .ingest("alpha in bucket A", Some("a-only.md"), None, Some(vec!["A".into()]))
        .expect("ingest A");
    engine
        .ingest("alpha in bucket B", Some("b-only.md"), None, Some(vec!["B".into()]))
        .expect("ingest B");

    let result = engine
        .search("alpha", Some(vec!["A".into()]), 500, "all")
        .expect("search succeeds");

    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].source, "a-only.md");
}

#[test]
fn s4_provenance_bias() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine_in(tmp.path());

    engine
        .ingest("shared material (internal copy)", Some("int.md"), Some(Provenance::Internal), None)
        .expect("ingest internal");
    engine
        .ingest("shared material (external copy)", Some("ext.md"), Some(Provenance::External), None)
        .expect("ingest external");

    let sovereign = engine
        .search("shared material", None, 500, "sovereign")
        .expect("sovereign search succeeds");
    assert_eq!(sovereign.results[0].source, "int.md");

    let external = engine
        .search("shared material", None, 500, "external")
        .expect("external search succeeds");
    assert_eq!(external.results[0].source, "ext.md");
}

#[test]
fn s5_context_inflator_density() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine_in(tmp.path());

    let mut body = "x".repeat(100);
    body.push_str("needle");
    body.push_str(&"y".repeat(2500 - 106));
    body.push_str("needle");
    body.push_str(&"z".repeat(4900 - 2506));
    body.push_str("needle");
    body.push_str(&"w".repeat(5000 - body.len().min(5000)));
    assert!(body.len() >= 5000);

    engine
        .ingest(&body, Some("dense.md"), None, None)
        .expect("ingest succeeds");

    let result = engine
        .search("needle", None, 2000, "all")
        .expect("search succeeds");

    assert!(!result.results.is_empty());
    assert!(result.context.chars().count() <= 2000);
    for hit in &result.results {
        assert!(hit.end_byte - hit.start_byte >= 200 || result.results.len() == 1);
    }
}

#[test]
fn s6_snapshot_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let first_boot = engine_in(tmp.path());

    first_boot.ingest("first compound", Some("one.md"), None, None).unwrap();
    first_boot.ingest("second compound", Some("two.md"), None, None).unwrap();
    first_boot.ingest("third compound", Some("three.md"), None, None).unwrap();

    first_boot.backup(1_000).expect("backup succeeds");
    drop(first_boot);

    std::fs::remove_file(tmp.path().join("context.db")).ok();

    let reboot = engine_in(tmp.path());
    let buckets = reboot.buckets().expect("buckets readable after hydration");
    assert!(!buckets.is_empty());

    let result = reboot.search("compound", None, 500, "all").expect("search after hydration");
    let sources: std::collections::HashSet<_> = result.results.iter().map(|h| h.source.clone()).collect();
    assert!(sources.contains("one.md"));
    assert!(sources.contains("two.md"));
    assert!(sources.contains("three.md"));
}
