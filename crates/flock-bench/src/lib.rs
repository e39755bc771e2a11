//! Benchmark profiles for the Flock runtime.
//!
//! - [`scatter`]: deterministic point cloud for continuous-space queries
//! - [`populated_grid`] / [`populated_continuous`]: spaces pre-filled
//!   with agents whose ids are `0..n`
//! - [`wealth_profile`]: the wealth model at a benchmark-sized scale

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use flock_core::{AgentId, ConfigError, ParamSet, RandomSource};
use flock_engine::Model;
use flock_models::wealth::{self, Trader};
use flock_space::walk::place_at_random_empty;
use flock_space::{Continuous2D, OrthogonalGrid, Point, Space, SpaceError};

/// `n` points uniform over `[0, width) x [0, height)`.
pub fn scatter(n: usize, width: f64, height: f64, seed: u64) -> Vec<Point> {
    let mut rng = RandomSource::new(seed);
    (0..n)
        .map(|_| Point::new(rng.uniform_range(0.0, width), rng.uniform_range(0.0, height)))
        .collect()
}

/// A `side` x `side` multi-occupancy torus with `n` agents on random cells.
pub fn populated_grid(side: u32, n: usize, seed: u64) -> Result<OrthogonalGrid, SpaceError> {
    let mut grid = OrthogonalGrid::multi(side, side, true)?;
    let mut rng = RandomSource::new(seed);
    for i in 0..n {
        let pos = (
            rng.int_range(0, side as i64 - 1) as i32,
            rng.int_range(0, side as i64 - 1) as i32,
        );
        grid.place(AgentId(i as u64), pos)?;
    }
    Ok(grid)
}

/// A single-occupancy torus filled to `density` on random empty cells.
pub fn sparse_grid(side: u32, density: f64, seed: u64) -> Result<OrthogonalGrid, SpaceError> {
    let mut grid = OrthogonalGrid::new(side, side, true)?;
    let mut rng = RandomSource::new(seed);
    let n = ((side * side) as f64 * density) as u64;
    for i in 0..n {
        place_at_random_empty(&mut grid, AgentId(i), &mut rng)?;
    }
    Ok(grid)
}

/// A `side` x `side` continuous torus holding `n` scattered agents.
pub fn populated_continuous(
    side: f64,
    n: usize,
    bucket: f64,
    seed: u64,
) -> Result<Continuous2D, SpaceError> {
    let mut space = Continuous2D::with_bucket_size(side, side, true, bucket)?;
    for (i, p) in scatter(n, side, side, seed).into_iter().enumerate() {
        space.place(AgentId(i as u64), p)?;
    }
    Ok(space)
}

/// Wealth model with `n` traders on a `side` x `side` torus.
pub fn wealth_profile(n: usize, side: u32, seed: u64) -> Result<Model<Trader>, ConfigError> {
    let params = ParamSet::new()
        .with("n", n)
        .with("width", side)
        .with("height", side);
    wealth::build(&params, seed)
}
