//! Criterion benchmarks for full controller runs on the reference grid.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use plume_bench::{reference_raster, reference_run, ReferenceRun};
use plume_raster::SyncPolicy;

fn bench_run(c: &mut Criterion, name: &str, policy: SyncPolicy) {
    let shape = ReferenceRun::default();
    let mut group = c.benchmark_group("reference_run");
    group.sample_size(10);
    group.bench_function(name, |b| {
        b.iter(|| {
            let raster = Arc::new(reference_raster(policy).unwrap());
            let report = reference_run(&shape, raster).unwrap();
            black_box(report.metrics.total_us);
        });
    });
    group.finish();
}

fn bench_run_locked(c: &mut Criterion) {
    bench_run(c, "60_rounds_4x1k_locked", SyncPolicy::Locked);
}

fn bench_run_atomic(c: &mut Criterion) {
    bench_run(c, "60_rounds_4x1k_atomic", SyncPolicy::Atomic);
}

criterion_group!(benches, bench_run_locked, bench_run_atomic);
criterion_main!(benches);
