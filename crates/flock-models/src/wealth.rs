//! Boltzmann wealth exchange.
//!
//! Agents wander a torus and hand one unit of wealth to a random
//! cellmate whenever they have any. Total wealth is conserved; the
//! distribution drifts from uniform towards an exponential one.

use flock_core::{ConfigError, ParamSet, Value};
use flock_engine::{Activation, Agent, AgentContext, AgentError, DataCollector, Model};
use flock_space::walk::random_move;
use flock_space::{GridQuery, OrthogonalGrid, Space, SpaceError};

use crate::{dim, setup_config, space_config};

/// Catalog name.
pub const NAME: &str = "wealth";

/// A trader holding whole units of wealth.
#[derive(Clone, Debug, PartialEq)]
pub struct Trader {
    /// Units held.
    pub wealth: i64,
}

impl Agent for Trader {
    type Env = OrthogonalGrid;

    fn type_tag(&self) -> &'static str {
        "trader"
    }

    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        let id = ctx.id();
        let parts = ctx.parts();
        random_move(parts.env, id, &GridQuery::moore(1), parts.rng)?;
        if self.wealth <= 0 {
            return Ok(());
        }
        let here = ctx.env().position(id).ok_or(SpaceError::NotPlaced { agent: id })?;
        let mates: Vec<_> = ctx
            .env()
            .contents(here)?
            .into_iter()
            .filter(|&other| other != id)
            .collect();
        let Some(&other) = ctx.rng().choose(&mates) else {
            return Ok(());
        };
        if let Some(mate) = ctx.agent_mut(other) {
            mate.wealth += 1;
            self.wealth -= 1;
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "wealth" => Some(self.wealth.into()),
            _ => None,
        }
    }
}

/// Default parameters.
pub fn defaults() -> ParamSet {
    ParamSet::new()
        .with("n", 100i64)
        .with("width", 10i64)
        .with("height", 10i64)
}

/// Gini coefficient of a wealth distribution.
///
/// `1 + 1/N - 2 Σ xᵢ(N - i + 1) / (N Σ x)` over the ascending sort with
/// 1-based `i`. Zero for an empty or all-zero distribution.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    let total: f64 = values.iter().sum();
    if n == 0 || total <= 0.0 {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let nf = n as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| x * (nf - i as f64))
        .sum();
    1.0 + 1.0 / nf - 2.0 * weighted / (nf * total)
}

/// Gini coefficient over the model's current traders.
pub fn model_gini(model: &Model<Trader>) -> f64 {
    let w: Vec<f64> = model.agents().iter().map(|(_, t)| t.wealth as f64).collect();
    gini(&w)
}

/// Build a seeded wealth model.
///
/// Parameters: `n` traders (100), `width` (10), `height` (10). Every
/// trader starts with one unit on a uniformly random cell.
pub fn build(params: &ParamSet, seed: u64) -> Result<Model<Trader>, ConfigError> {
    let n = params.usize_or("n", 100)?;
    let width = dim(params, "width", 10)?;
    let height = dim(params, "height", 10)?;
    let grid = OrthogonalGrid::multi(width, height, true).map_err(space_config)?;

    let collector = DataCollector::builder()
        .model("gini", |m: &Model<Trader>| model_gini(m).into())
        .attribute("wealth")
        .build()?;
    let mut model = Model::builder(grid)
        .seed(seed)
        .params(params.clone())
        .activation(Activation::Random)
        .collector(collector)
        .build()?;

    for _ in 0..n {
        model
            .create_with(Trader { wealth: 1 }, |id, grid, rng| {
                let x = rng.int_range(0, i64::from(width) - 1) as i32;
                let y = rng.int_range(0, i64::from(height) - 1) as i32;
                grid.place(id, (x, y))?;
                Ok(())
            })
            .map_err(setup_config)?;
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gini_extremes() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0.0, 0.0]), 0.0);
        assert!(gini(&[5.0; 10]).abs() < 1e-12);
        let mut v = vec![0.0; 9];
        v.push(10.0);
        assert!((gini(&v) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn wealth_is_conserved() {
        let mut m = build(&ParamSet::new().with("n", 50i64), 3).unwrap();
        m.run_for(20).unwrap();
        let total: i64 = m.agents().iter().map(|(_, t)| t.wealth).sum();
        assert_eq!(total, 50);
        assert!(m.agents().iter().all(|(_, t)| t.wealth >= 0));
    }

    #[test]
    fn rejects_zero_width() {
        let err = build(&ParamSet::new().with("width", 0i64), 1).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));
    }

    proptest! {
        #[test]
        fn gini_is_bounded(values in proptest::collection::vec(0u32..1_000, 1..64)) {
            let xs: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
            let g = gini(&xs);
            prop_assert!(g >= -1e-12 && g < 1.0, "gini {}", g);
        }
    }
}
