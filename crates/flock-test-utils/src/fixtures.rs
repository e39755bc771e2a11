//! Reusable agent fixtures.
//!
//! - [`Scripted`]: counts its activations and follows a script (fail, spawn
//!   or remove itself on a given activation).
//! - [`Walker`]: random walk on an [`OrthogonalGrid`].

use flock_core::{ConfigError, Record};
use flock_engine::{Activation, Agent, AgentContext, AgentError, Model, StepRecovery};
use flock_space::walk::{place_at_random_empty, random_move};
use flock_space::{GridQuery, OrthogonalGrid};

/// Scripted agent without a space.
///
/// Activations are counted from 1. Every activation also appends a row
/// `{ step }` to the `"scripted"` event table when one is configured.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scripted {
    pub steps: u32,
    pub fail_on: Option<u32>,
    pub spawn_on: Option<u32>,
    pub remove_on: Option<u32>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error on the `n`-th activation.
    pub fn failing_on(mut self, n: u32) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Create a fresh scripted agent on the `n`-th activation.
    pub fn spawning_on(mut self, n: u32) -> Self {
        self.spawn_on = Some(n);
        self
    }

    /// Remove itself on the `n`-th activation.
    pub fn removing_on(mut self, n: u32) -> Self {
        self.remove_on = Some(n);
        self
    }
}

impl Agent for Scripted {
    type Env = ();

    fn type_tag(&self) -> &'static str {
        "scripted"
    }

    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        self.steps += 1;
        let n = self.steps;
        ctx.record("scripted", Record::new().with("step", n));
        if self.fail_on == Some(n) {
            return Err(AgentError::failed(format!("deliberate failure on activation {n}")));
        }
        if self.spawn_on == Some(n) {
            ctx.create(Scripted::new());
        }
        if self.remove_on == Some(n) {
            ctx.remove_self();
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<flock_core::Value> {
        (name == "steps").then(|| self.steps.into())
    }
}

/// Model over `scripts` with the given policies and seed 0.
pub fn scripted_model(
    scripts: impl IntoIterator<Item = Scripted>,
    activation: Activation,
    recovery: StepRecovery,
) -> Result<Model<Scripted>, ConfigError> {
    let mut model = Model::builder(())
        .seed(0)
        .activation(activation)
        .recovery(recovery)
        .build()?;
    for p in scripts {
        model.create(p);
    }
    Ok(model)
}

/// Random walker in the Moore neighborhood.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Walker {
    pub moves: u32,
}

impl Agent for Walker {
    type Env = OrthogonalGrid;

    fn type_tag(&self) -> &'static str {
        "walker"
    }

    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        let id = ctx.id();
        let parts = ctx.parts();
        if random_move(parts.env, id, &GridQuery::moore(1), parts.rng)?.is_some() {
            self.moves += 1;
        }
        Ok(())
    }
}

/// `n` walkers placed on random empty cells of a `width` x `height`
/// single-occupancy torus.
pub fn walker_model(
    width: u32,
    height: u32,
    n: usize,
    seed: u64,
) -> Result<Model<Walker>, AgentError> {
    let grid = OrthogonalGrid::new(width, height, true)?;
    let mut model = Model::builder(grid).seed(seed).build()?;
    for _ in 0..n {
        model.create_with(Walker::default(), |id, grid, rng| {
            place_at_random_empty(grid, id, rng)?;
            Ok(())
        })?;
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_space::Space;

    #[test]
    fn scripted_counts_activations() {
        let scripts = [Scripted::new(), Scripted::new()];
        let mut m = scripted_model(scripts, Activation::Sequential, StepRecovery::AbortTick).unwrap();
        m.run_for(3).unwrap();
        assert!(m.agents().iter().all(|(_, p)| p.steps == 3));
    }

    #[test]
    fn walkers_stay_on_the_grid() {
        let mut m = walker_model(6, 6, 10, 3).unwrap();
        m.run_for(5).unwrap();
        let ids = m.agents().ids();
        assert_eq!(ids.len(), 10);
        for id in ids {
            assert!(m.env().position(id).is_some());
        }
    }
}
