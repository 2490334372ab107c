//! Ingest and read-path benchmarks
//!
//! Fixed inputs, no I/O, no sink attached. Readings are built up front so the
//! ingest numbers measure validation, append and indexing only.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strainscope_core::{Aggregator, AggregatorConfig, Reading};

fn readings(sensor_id: &str, count: usize) -> Vec<Reading> {
    (0..count)
        .map(|i| {
            let value = 150.0 + 250.0 * (i as f64 * 0.05).sin();
            Reading::new(sensor_id, 1_700_000_000_000 + i as u64 * 100, value, i as i32, 90, 21.0)
        })
        .collect()
}

fn filled(capacity: usize) -> Aggregator {
    let agg = Aggregator::new(AggregatorConfig::default().with_capacity(capacity))
        .expect("valid config");
    agg.ingest_batch(readings("SG-01", capacity));
    agg
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    group.sample_size(20);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    for &capacity in &[1_000usize, 10_000] {
        let batch = readings("SG-01", 10_000);
        group.throughput(Throughput::Elements(batch.len() as u64));

        group.bench_with_input(BenchmarkId::new("single_sensor", capacity), &capacity, |b, &capacity| {
            let agg = filled(capacity);
            b.iter(|| {
                for reading in &batch {
                    black_box(agg.ingest(reading.clone()));
                }
            });
        });
    }

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");
    group.sample_size(20);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let agg = filled(10_000);

    group.bench_function("snapshot_10k", |b| b.iter(|| black_box(agg.snapshot("SG-01"))));
    group.bench_function("stats_10k", |b| b.iter(|| black_box(agg.stats("SG-01"))));

    for &(max_points, decimation) in &[(1_000usize, 1usize), (1_000, 10), (0, 1)] {
        group.bench_with_input(
            BenchmarkId::new("trace", format!("max{}_dec{}", max_points, decimation)),
            &(max_points, decimation),
            |b, &(max_points, decimation)| {
                b.iter(|| black_box(agg.get_trace("SG-01", max_points, decimation)));
            },
        );
    }

    let cursor = 1_700_000_000_000 + 9_900 * 100;
    group.bench_function("get_since_tail_100", |b| {
        b.iter(|| black_box(agg.get_since("SG-01", black_box(cursor))))
    });

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_reads);
criterion_main!(benches);
