//! Criterion benchmarks for whole-model stepping and sweeps.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use flock_bench::wealth_profile;
use flock_core::{CancelToken, ParameterGrid};
use flock_engine::Sampling;
use flock_models::{find, SweepOptions};
use flock_test_utils::walker_model;

/// Benchmark: one step of 1K wealth traders on a 50x50 torus.
fn bench_wealth_step_1k(c: &mut Criterion) {
    c.bench_function("wealth_step_1k", |b| {
        b.iter_batched(
            || wealth_profile(1_000, 50, 42).unwrap(),
            |mut m| {
                m.step().unwrap();
                black_box(m.tick())
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: ten steps of 2K single-occupancy walkers.
fn bench_walkers_10_steps(c: &mut Criterion) {
    c.bench_function("walkers_2k_10_steps", |b| {
        b.iter_batched(
            || walker_model(100, 100, 2_000, 9).unwrap(),
            |mut m| {
                m.run_for(10).unwrap();
                black_box(m.tick())
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: 16-run wealth sweep on four workers.
fn bench_wealth_sweep(c: &mut Criterion) {
    let scenario = find("wealth").unwrap();
    let options = SweepOptions {
        repetitions: 4,
        max_steps: 50,
        master_seed: 1,
        workers: Some(4),
        sampling: Sampling::Final,
        cancel: CancelToken::new(),
    };
    let grid = ParameterGrid::new().sweep("n", [50i64, 100, 150, 200]);

    let mut group = c.benchmark_group("batch");
    group.sample_size(10);
    group.bench_function("wealth_sweep_16_runs", |b| {
        b.iter(|| black_box(scenario.sweep(grid.clone(), &options).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_wealth_step_1k, bench_walkers_10_steps, bench_wealth_sweep);
criterion_main!(benches);
