//! Named-model catalog for the CLI.
//!
//! Every reference model is exposed as a [`Scenario`] trait object so a
//! frontend can run or sweep a model chosen by name without knowing its
//! agent type.

use flock_core::{CancelToken, ConfigError, ParamSet, ParameterGrid, Table};
use flock_engine::{Agent, BatchError, BatchRunner, Model, ModelError, Sampling};
use tracing::info;

use crate::{bank_reserves, conway, segregation, virus, wealth, wolf_sheep};

/// Tables produced by a single run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutput {
    /// Wide model table: `tick` plus one column per model reporter.
    pub model: Table,
    /// Wide agent table: `tick, agent_id` plus one column per agent reporter.
    pub agents: Table,
    /// Ticks completed.
    pub ticks: u64,
}

/// Sweep settings forwarded to [`BatchRunner`].
#[derive(Clone, Debug)]
pub struct SweepOptions {
    /// Runs per parameter combination.
    pub repetitions: usize,
    /// Step budget per run.
    pub max_steps: u64,
    /// Master seed.
    pub master_seed: u64,
    /// Worker threads; `None` picks automatically.
    pub workers: Option<usize>,
    /// Row sampling per run.
    pub sampling: Sampling,
    /// Cooperative cancellation.
    pub cancel: CancelToken,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            repetitions: 1,
            max_steps: 100,
            master_seed: 0,
            workers: None,
            sampling: Sampling::Final,
            cancel: CancelToken::new(),
        }
    }
}

/// A model that can be run or swept by name.
pub trait Scenario: Send + Sync {
    /// Catalog name.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Parameters and their default values.
    fn defaults(&self) -> ParamSet;

    /// Run one seeded model for at most `steps` ticks.
    fn run(
        &self,
        params: &ParamSet,
        seed: u64,
        steps: u64,
        cancel: &CancelToken,
    ) -> Result<RunOutput, ModelError>;

    /// Sweep a parameter grid.
    fn sweep(&self, grid: ParameterGrid, options: &SweepOptions) -> Result<Table, BatchError>;
}

type Factory<A> = fn(&ParamSet, u64) -> Result<Model<A>, ConfigError>;

struct Entry<A: Agent> {
    name: &'static str,
    description: &'static str,
    defaults: fn() -> ParamSet,
    factory: Factory<A>,
}

impl<A: Agent> Scenario for Entry<A> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn defaults(&self) -> ParamSet {
        (self.defaults)()
    }

    fn run(
        &self,
        params: &ParamSet,
        seed: u64,
        steps: u64,
        cancel: &CancelToken,
    ) -> Result<RunOutput, ModelError> {
        let mut model = (self.factory)(params, seed)?;
        model.run_for_with(steps, cancel)?;
        model.finish();
        let ticks = model.tick().0;
        info!(model = self.name, seed, ticks, "run complete");
        let (model_table, agent_table) = match model.collector() {
            Some(c) => (c.model_wide(), c.agent_wide()),
            None => (Table::new(["tick"]), Table::new(["tick", "agent_id"])),
        };
        Ok(RunOutput {
            model: model_table,
            agents: agent_table,
            ticks,
        })
    }

    fn sweep(&self, grid: ParameterGrid, options: &SweepOptions) -> Result<Table, BatchError> {
        let mut runner = BatchRunner::new(self.factory)
            .parameters(grid)
            .repetitions(options.repetitions)
            .max_steps(options.max_steps)
            .master_seed(options.master_seed)
            .sampling(options.sampling)
            .cancel_token(options.cancel.clone());
        if let Some(w) = options.workers {
            runner = runner.workers(w);
        }
        runner.run()
    }
}

/// Every reference model, in listing order.
pub fn catalog() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(Entry {
            name: wealth::NAME,
            description: "Boltzmann wealth exchange on a torus grid",
            defaults: wealth::defaults,
            factory: wealth::build,
        }),
        Box::new(Entry {
            name: segregation::NAME,
            description: "Schelling segregation; stops when everyone is happy",
            defaults: segregation::defaults,
            factory: segregation::build,
        }),
        Box::new(Entry {
            name: wolf_sheep::NAME,
            description: "Predator-prey with regrowing grass",
            defaults: wolf_sheep::defaults,
            factory: wolf_sheep::build,
        }),
        Box::new(Entry {
            name: conway::NAME,
            description: "Conway's Game of Life under simultaneous activation",
            defaults: conway::defaults,
            factory: conway::build,
        }),
        Box::new(Entry {
            name: virus::NAME,
            description: "SIR epidemic on an Erdos-Renyi network",
            defaults: virus::defaults,
            factory: virus::build,
        }),
        Box::new(Entry {
            name: bank_reserves::NAME,
            description: "Fractional-reserve banking between trading people",
            defaults: bank_reserves::defaults,
            factory: bank_reserves::build,
        }),
    ]
}

/// Look a model up by name.
///
/// # Errors
///
/// [`ConfigError::UnknownModel`] if no model has that name.
pub fn find(name: &str) -> Result<Box<dyn Scenario>, ConfigError> {
    catalog()
        .into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| ConfigError::UnknownModel {
            name: name.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_findable() {
        let names: Vec<_> = catalog().iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 6);
        for n in &names {
            assert_eq!(find(n).unwrap().name(), *n);
        }
        assert!(matches!(find("boids"), Err(ConfigError::UnknownModel { .. })));
    }

    #[test]
    fn defaults_build_every_model() {
        for s in catalog() {
            let out = s.run(&s.defaults(), 1, 2, &CancelToken::new()).unwrap();
            assert!(out.ticks <= 2, "{}", s.name());
            assert!(!out.model.is_empty(), "{}", s.name());
        }
    }
}
