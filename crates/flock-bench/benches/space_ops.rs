//! Criterion micro-benchmarks for neighborhood queries.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use flock_bench::{populated_continuous, populated_grid, scatter, sparse_grid};
use flock_core::RandomSource;
use flock_space::{DiscreteSpace, GridQuery, HexGrid, HexQuery, RadiusQuery, Space};

/// Benchmark: Moore neighbors of every cell of a 100x100 torus holding 5K agents.
fn bench_grid_neighbors_10k(c: &mut Criterion) {
    let grid = populated_grid(100, 5_000, 1).unwrap();
    let query = GridQuery::moore(1);

    c.bench_function("grid_neighbors_moore_10k", |b| {
        b.iter(|| {
            for y in 0..100 {
                for x in 0..100 {
                    black_box(grid.neighbors((x, y), &query).unwrap());
                }
            }
        });
    });
}

/// Benchmark: radius-3 von Neumann neighborhoods (positions only).
fn bench_grid_neighborhood_radius3(c: &mut Criterion) {
    let grid = populated_grid(100, 0, 1).unwrap();
    let query = GridQuery::von_neumann(3);

    c.bench_function("grid_neighborhood_vn3_10k", |b| {
        b.iter(|| {
            for y in 0..100 {
                for x in 0..100 {
                    black_box(grid.neighborhood((x, y), &query).unwrap());
                }
            }
        });
    });
}

/// Benchmark: hex neighborhoods over a 100x100 hex torus.
fn bench_hex_neighborhood_10k(c: &mut Criterion) {
    let hex = HexGrid::new(100, 100, true).unwrap();
    let query = HexQuery::radius(1);

    c.bench_function("hex_neighborhood_10k", |b| {
        b.iter(|| {
            for r in 0..100 {
                for q in 0..100 {
                    black_box(hex.neighborhood((q, r), &query).unwrap());
                }
            }
        });
    });
}

/// Benchmark: 1K radius queries against 10K agents in a continuous torus.
fn bench_continuous_radius_queries(c: &mut Criterion) {
    let space = populated_continuous(1_000.0, 10_000, 10.0, 7).unwrap();
    let queries = scatter(1_000, 1_000.0, 1_000.0, 8);
    let query = RadiusQuery::new(10.0);

    c.bench_function("continuous_radius10_1k_queries", |b| {
        b.iter(|| {
            for &p in &queries {
                black_box(space.neighbors(p, &query).unwrap());
            }
        });
    });
}

/// Benchmark: random empty-cell selection on a 90% full grid.
fn bench_random_empty_cell(c: &mut Criterion) {
    let grid = sparse_grid(100, 0.9, 3).unwrap();
    let mut rng = RandomSource::new(4);

    c.bench_function("random_empty_cell_90pct", |b| {
        b.iter(|| black_box(grid.random_empty_cell(&mut rng)));
    });
}

criterion_group!(
    benches,
    bench_grid_neighbors_10k,
    bench_grid_neighborhood_radius3,
    bench_hex_neighborhood_10k,
    bench_continuous_radius_queries,
    bench_random_empty_cell
);
criterion_main!(benches);
