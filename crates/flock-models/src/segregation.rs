//! Schelling segregation.
//!
//! Two groups share a torus. An agent is happy when at least `homophily`
//! of its Moore neighbors belong to its own group; unhappy agents jump
//! to a random empty cell. The model stops once everyone is happy.

use flock_core::{ConfigError, ParamSet, Value};
use flock_engine::{Activation, Agent, AgentContext, AgentError, DataCollector, Model};
use flock_space::walk::move_to_random_empty;
use flock_space::{DiscreteSpace, GridQuery, OrthogonalGrid, Space, SpaceError};

use crate::{dim, setup_config, space_config};

/// Catalog name.
pub const NAME: &str = "segregation";

/// A resident of group 0 (majority) or 1 (minority).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resident {
    /// Group membership.
    pub group: u8,
    /// Outcome of the last evaluation.
    pub happy: bool,
    homophily: usize,
}

impl Resident {
    /// A resident that wants at least `homophily` like neighbors.
    pub fn new(group: u8, homophily: usize) -> Self {
        Self {
            group,
            happy: false,
            homophily,
        }
    }
}

impl Agent for Resident {
    type Env = OrthogonalGrid;

    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        let id = ctx.id();
        let here = ctx.env().position(id).ok_or(SpaceError::NotPlaced { agent: id })?;
        let similar = ctx
            .env()
            .neighbors(here, &GridQuery::moore(1))?
            .into_iter()
            .filter(|&n| ctx.agent(n).is_some_and(|r| r.group == self.group))
            .count();
        self.happy = similar >= self.homophily;
        if !self.happy {
            let parts = ctx.parts();
            move_to_random_empty(parts.env, id, parts.rng)?;
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "group" => Some(i64::from(self.group).into()),
            "happy" => Some(self.happy.into()),
            _ => None,
        }
    }
}

/// Default parameters.
pub fn defaults() -> ParamSet {
    ParamSet::new()
        .with("width", 20i64)
        .with("height", 20i64)
        .with("density", 0.8)
        .with("minority", 0.2)
        .with("homophily", 3i64)
}

/// Number of currently happy residents.
pub fn happy_count(model: &Model<Resident>) -> usize {
    model.agents().count_where(|r| r.happy)
}

/// Build a seeded segregation model.
///
/// `density` of the cells (rounded) are filled one resident at a time:
/// a random empty cell is picked, then the resident joins the minority
/// with probability `minority`.
pub fn build(params: &ParamSet, seed: u64) -> Result<Model<Resident>, ConfigError> {
    let width = dim(params, "width", 20)?;
    let height = dim(params, "height", 20)?;
    let density = params.probability_or("density", 0.8)?;
    let minority = params.probability_or("minority", 0.2)?;
    let homophily = params.usize_or("homophily", 3)?;
    if homophily > 8 {
        return Err(ConfigError::invalid("homophily", "at most 8 neighbors exist"));
    }
    let grid = OrthogonalGrid::new(width, height, true).map_err(space_config)?;

    let collector = DataCollector::builder()
        .model("happy_count", |m: &Model<Resident>| happy_count(m).into())
        .model("population", |m: &Model<Resident>| m.agents().count().into())
        .attribute("group")
        .attribute("happy")
        .build()?;
    let mut model = Model::builder(grid)
        .seed(seed)
        .params(params.clone())
        .activation(Activation::Random)
        .collector(collector)
        .after_step(|m: &mut Model<Resident>| {
            if happy_count(m) == m.agents().count() {
                m.stop();
            }
            Ok(())
        })
        .build()?;

    let residents = (density * model.env().cell_count() as f64).round() as usize;
    for _ in 0..residents {
        let (grid, rng) = model.env_and_rng();
        let Some(cell) = grid.random_empty_cell(rng) else {
            break;
        };
        let group = u8::from(model.rng().bernoulli(minority));
        model
            .create_with(Resident::new(group, homophily), |id, grid, _| {
                grid.place(id, cell)?;
                Ok(())
            })
            .map_err(setup_config)?;
    }
    Ok(model)
}
