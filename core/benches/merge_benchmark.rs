/// Snapshot and request-building benchmarks using Criterion
///
/// Run with: cargo bench --bench merge_benchmark
///
/// Benchmarks cover:
/// - Merging partial payloads into a populated snapshot
/// - Building the stats request body from a large interest ledger
use std::collections::BTreeMap;

use argus_core::domains::stats::{DashboardStats, StatsKey};
use argus_core::{PollDomain, RequestLedger, Snapshot};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

fn payload(count: usize, offset: usize) -> BTreeMap<String, Value> {
    (0..count)
        .map(|i| {
            (
                format!("release-{}", i + offset),
                json!({"total": i, "passed": i / 2, "failed": i / 3}),
            )
        })
        .collect()
}

/// Benchmark: merge a partial update into a snapshot of 1k entries
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_merge");

    for partial in [10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*partial as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(partial),
            partial,
            |b, &count| {
                let mut base = Snapshot::new();
                base.merge(payload(1_000, 0));
                let update = payload(count, 500);
                b.iter(|| {
                    let mut snap = base.clone();
                    snap.merge(black_box(update.clone()));
                    black_box(snap.revision)
                });
            },
        );
    }
    group.finish();
}

/// Benchmark: build the stats request from a ledger with many groups
fn bench_stats_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats_request");

    for releases in [5, 50].iter() {
        let ledger = RequestLedger::new();
        for r in 0..*releases {
            ledger.register(StatsKey::release(format!("{}", r)));
            for g in 0..20 {
                ledger.register(StatsKey::group(format!("{}", r), format!("group-{}", g)));
            }
        }
        let keys = ledger.keys();

        group.throughput(Throughput::Elements(keys.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(releases), &keys, |b, keys| {
            b.iter(|| black_box(DashboardStats.build_requests(black_box(keys))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge, bench_stats_request);
criterion_main!(benches);
