//! Tag-Walker search benchmarks
//!
//! Run with: cargo bench -p engine-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use engine_core::ingest::ingest_content;
use engine_core::model::Provenance;
use engine_core::search::{search, sanitize_fts_query, ProvenanceMode, SearchRequest};
use engine_core::store::Store;

fn seeded_store(n: usize) -> Store {
    let store = Store::open_in_memory().expect("open in-memory store");
    for i in 0..n {
        let content = format!(
            "Document number {i} discusses the ECE context engine and its tag walker search. \
             It mentions Rust, SQLite, and graph associative neighbor expansion."
        );
        ingest_content(
            &store,
            &content,
            &format!("doc-{i}.md"),
            Provenance::Internal,
            vec!["bench".to_string()],
        )
        .expect("ingest");
    }
    store
}

fn bench_sanitize_fts_query(c: &mut Criterion) {
    c.bench_function("sanitize_fts_query", |b| {
        b.iter(|| {
            black_box(sanitize_fts_query("hello world \"exact phrase\" OR special-chars!@#"));
        })
    });
}

fn bench_search_small_corpus(c: &mut Criterion) {
    let store = seeded_store(50);
    c.bench_function("tagwalker_search_50docs", |b| {
        b.iter(|| {
            let request = SearchRequest {
                query: "ECE graph".to_string(),
                buckets: Some(vec!["bench".to_string()]),
                scope_tags: vec![],
                max_chars: 2000,
                provenance: ProvenanceMode::All,
            };
            black_box(search(&store, &request).expect("search"));
        })
    });
}

fn bench_search_larger_corpus(c: &mut Criterion) {
    let store = seeded_store(500);
    c.bench_function("tagwalker_search_500docs", |b| {
        b.iter(|| {
            let request = SearchRequest {
                query: "ECE graph".to_string(),
                buckets: None,
                scope_tags: vec![],
                max_chars: 4000,
                provenance: ProvenanceMode::Sovereign,
            };
            black_box(search(&store, &request).expect("search"));
        })
    });
}

criterion_group!(
    benches,
    bench_sanitize_fts_query,
    bench_search_small_corpus,
    bench_search_larger_corpus,
);
criterion_main!(benches);
