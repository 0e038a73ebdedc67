use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use liveness::{
    Eligibility, LivenessStore, LivenessTable, MetricsRegistry, Prober, ServerRecord, TcpProber,
};
use std::hint::black_box;
use std::time::{Duration, SystemTime};

fn fleet(count: usize) -> Vec<ServerRecord> {
    (0..count)
        .map(|i| {
            let prefix = if i % 3 == 0 { "spare" } else { "DP" };
            ServerRecord::new(
                format!("{prefix}-{i:05}"),
                format!("10.{}.{}.{}", i / 65_536, (i / 256) % 256, i % 256),
                format!("172.16.{}.{}", (i / 256) % 256, i % 256),
            )
        })
        .collect()
}

fn eligibility_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("eligibility");
    let eligibility = Eligibility::default();

    for size in [100, 1_000, 10_000] {
        let servers = fleet(size);
        group.bench_with_input(BenchmarkId::new("filter", size), &servers, |b, servers| {
            b.iter(|| {
                servers
                    .iter()
                    .filter(|s| eligibility.is_eligible(black_box(&s.name)))
                    .count()
            })
        });
    }

    group.finish();
}

fn table_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("liveness_table");
    let now = SystemTime::now();

    for size in [100, 1_000, 10_000] {
        let mut table = LivenessTable::new(size);
        for index in 0..size {
            table.record_primary(index, index % 2 == 0, now).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("snapshot", size), &table, |b, table| {
            b.iter(|| black_box(table.snapshot()))
        });
    }

    group.finish();
}

fn store_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for size in [100, 1_000] {
        let store = LivenessStore::with_roster(fleet(size));
        rt.block_on(async {
            for index in 0..size {
                store.record_primary(index, true).await.unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::new("status", size), &store, |b, store| {
            b.iter(|| rt.block_on(async { black_box(store.status().await) }))
        });

        let metrics = MetricsRegistry::new();
        let entries = rt.block_on(store.snapshot());
        group.bench_with_input(
            BenchmarkId::new("metrics_update", size),
            &entries,
            |b, entries| b.iter(|| metrics.update_liveness(black_box(entries))),
        );
    }

    group.finish();
}

fn prober_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tcp_probe");

    // Port 1 on loopback is refused immediately, which measures probe overhead
    let prober = TcpProber::new(1, Duration::from_millis(100));
    let rt = tokio::runtime::Runtime::new().unwrap();

    group.bench_function("connection_refused", |b| {
        b.iter(|| rt.block_on(async { black_box(prober.check("127.0.0.1").await) }))
    });

    group.finish();
}

criterion_group!(
    benches,
    eligibility_benchmark,
    table_benchmark,
    store_benchmark,
    prober_benchmark
);
criterion_main!(benches);
