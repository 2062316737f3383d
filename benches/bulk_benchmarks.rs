#![allow(clippy::all)]

//! Bulk Benchmarks
//!
//! Benchmarks for action encoding, accumulation, response correlation and
//! backoff computation.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use osprey::osprey_http::{Backoff, BackoffExt, ExponentialBackoff};
use osprey::*;
use serde::Serialize;
use serde_json::json;
use std::hint::black_box;
use std::time::Duration;

#[derive(Serialize)]
struct Tweet {
    user: String,
    message: String,
    retweets: u32,
}

fn tweet(i: u32) -> Tweet {
    Tweet {
        user: format!("user{}", i),
        message: "Welcome to Golang and OpenSearch.".to_string(),
        retweets: i,
    }
}

// =============================================================================
// Encoding Benchmarks
// =============================================================================

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_encoding");

    let index = BulkAction::from(
        IndexAction::new()
            .index("tweets")
            .id("1")
            .doc(json!({"user": "olivere", "message": "hello", "retweets": 3})),
    );
    group.bench_function("index_json_value", |b| b.iter(|| black_box(index.encode())));

    let raw = BulkAction::from(
        IndexAction::new()
            .index("tweets")
            .id("1")
            .doc(r#"{"user":"olivere","message":"hello","retweets":3}"#),
    );
    group.bench_function("index_raw", |b| b.iter(|| black_box(raw.encode())));

    group.bench_function("index_typed", |b| {
        let doc = tweet(1);
        b.iter(|| {
            let action = IndexAction::new().index("tweets").id("1").try_doc(&doc).unwrap();
            black_box(BulkAction::from(action).encode())
        })
    });

    let update = BulkAction::from(
        UpdateAction::new()
            .index("tweets")
            .id("1")
            .script(Script::inline("ctx._source.retweets += params.n").param("n", 1))
            .upsert(json!({"retweets": 0}))
            .retry_on_conflict(3),
    );
    group.bench_function("update_script", |b| b.iter(|| black_box(update.encode())));

    let delete = BulkAction::from(DeleteAction::new().index("tweets").id("1"));
    group.bench_function("delete", |b| b.iter(|| black_box(delete.encode())));

    group.finish();
}

// =============================================================================
// Accumulator Benchmarks
// =============================================================================

fn bench_accumulator(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_accumulator");
    let client = Client::new(ClientConfig::default()).unwrap();

    for size in [10u32, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("add", size), &size, |b, &size| {
            b.iter(|| {
                let mut bulk = client.bulk().index("tweets");
                for i in 0..size {
                    bulk.add(IndexAction::new().id(i.to_string()).try_doc(&tweet(i)).unwrap())
                        .unwrap();
                }
                black_box(bulk.estimated_size_in_bytes())
            })
        });

        let mut bulk = client.bulk().index("tweets");
        for i in 0..size {
            bulk.add(IndexAction::new().id(i.to_string()).try_doc(&tweet(i)).unwrap())
                .unwrap();
        }
        group.bench_with_input(BenchmarkId::new("body", size), &bulk, |b, bulk| {
            b.iter(|| black_box(bulk.body()))
        });
    }

    group.finish();
}

// =============================================================================
// Response Benchmarks
// =============================================================================

fn bench_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_response");

    let items: Vec<_> = (0..1000)
        .map(|i| {
            if i % 10 == 0 {
                json!({"index": {"_index": "tweets", "_id": i.to_string(), "status": 429,
                    "error": {"type": "es_rejected_execution_exception", "reason": "queue full"}}})
            } else {
                json!({"index": {"_index": "tweets", "_id": i.to_string(), "_version": 1,
                    "status": 201, "result": "created"}})
            }
        })
        .collect();
    let body = serde_json::to_vec(&json!({"took": 30, "errors": true, "items": items})).unwrap();

    group.bench_function("decode_1000", |b| {
        b.iter(|| black_box(serde_json::from_slice::<BulkResponse>(&body).unwrap()))
    });

    let response: BulkResponse = serde_json::from_slice(&body).unwrap();
    group.bench_function("failed_1000", |b| b.iter(|| black_box(response.failed().len())));
    group.bench_function("by_id_1000", |b| b.iter(|| black_box(response.by_id("500").len())));

    group.finish();
}

// =============================================================================
// Backoff Benchmarks
// =============================================================================

fn bench_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff");

    let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(8))
        .with_max_retries(10);
    group.bench_function("exponential_next", |b| {
        b.iter(|| {
            for retry in 1..=10 {
                black_box(backoff.next(retry));
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encoding,
    bench_accumulator,
    bench_response,
    bench_backoff
);
criterion_main!(benches);
