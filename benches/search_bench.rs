use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use docsearch::{IndexSettings, SearchEngine, SearchRequest};

struct BenchEnv {
    _tmp: TempDir,
    engine: SearchEngine,
}

fn build_env(doc_count: usize) -> BenchEnv {
    let tmp = TempDir::new().unwrap();
    let engine = SearchEngine::open(IndexSettings::new(tmp.path().join("bench.index"))).unwrap();
    let cancel = CancellationToken::new();

    for i in 0..doc_count {
        let doc = json!({
            "message": format!("rust programming language doc {}", i),
            "level": if i % 3 == 0 { "error" } else { "info" },
            "tags": ["bench", format!("shard{}", i % 8)],
            "latency_ms": i % 250,
        });
        engine
            .index_document(&serde_json::to_vec(&doc).unwrap(), Some(format!("doc-{:06}", i)), &cancel)
            .unwrap();
    }

    BenchEnv { _tmp: tmp, engine }
}

fn bench_match_query(c: &mut Criterion) {
    let counts = [1_000usize, 5_000];
    let envs: Vec<(usize, BenchEnv)> = counts.iter().map(|&n| (n, build_env(n))).collect();
    let cancel = CancellationToken::new();
    let request = SearchRequest::new("rust error");

    let mut group = c.benchmark_group("match_query");
    for (count, env) in envs.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), env, |b, env| {
            b.iter(|| {
                black_box(env.engine.run_query(&request, &cancel).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_fetch_document(c: &mut Criterion) {
    let env = build_env(1_000);
    let cancel = CancellationToken::new();

    c.bench_function("fetch_document", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let id = format!("doc-{:06}", i % 1_000);
            i += 1;
            black_box(env.engine.fetch_document(&id, &cancel).unwrap());
        });
    });
}

fn bench_index_document(c: &mut Criterion) {
    let env = build_env(0);
    let cancel = CancellationToken::new();
    let payload = serde_json::to_vec(&json!({
        "message": "indexing throughput sample",
        "tags": ["a", "b", "c"],
        "at": "2024-05-01T12:00:00Z",
    }))
    .unwrap();

    c.bench_function("index_document", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            black_box(
                env.engine
                    .index_document(&payload, Some(format!("w{}", i % 500)), &cancel)
                    .unwrap(),
            );
        });
    });
}

criterion_group!(
    benches,
    bench_match_query,
    bench_fetch_document,
    bench_index_document
);
criterion_main!(benches);
