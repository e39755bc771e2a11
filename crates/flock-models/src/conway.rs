//! Conway's Game of Life under simultaneous activation.

use flock_core::{ConfigError, ParamSet, Value};
use flock_engine::{Activation, Agent, AgentContext, AgentError, DataCollector, Model, StageContext};
use flock_space::{GridQuery, OrthogonalGrid, Space, SpaceError};

use crate::{dim, setup_config, space_config};

/// Catalog name.
pub const NAME: &str = "conway";

/// One cell of the board. Cells never move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Published state.
    pub alive: bool,
    /// Staged state, written by `stage` and published by `commit`.
    next: bool,
}

impl Cell {
    /// A cell in the given state.
    pub fn new(alive: bool) -> Self {
        Self { alive, next: alive }
    }
}

impl Agent for Cell {
    type Env = OrthogonalGrid;

    fn step(&mut self, _ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        Ok(())
    }

    fn stage(&mut self, ctx: &mut StageContext<'_, Self>) -> Result<(), AgentError> {
        let id = ctx.id();
        let here = ctx.env().position(id).ok_or(SpaceError::NotPlaced { agent: id })?;
        let live = ctx
            .env()
            .neighbors(here, &GridQuery::moore(1))?
            .into_iter()
            .filter(|&n| ctx.agent(n).is_some_and(|c| c.alive))
            .count();
        self.next = matches!((self.alive, live), (true, 2) | (_, 3));
        Ok(())
    }

    fn commit(&mut self, _ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        self.alive = self.next;
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        (name == "alive").then(|| self.alive.into())
    }
}

/// Default parameters.
pub fn defaults() -> ParamSet {
    ParamSet::new()
        .with("width", 50i64)
        .with("height", 50i64)
        .with("fill", 0.1)
}

/// Live cell coordinates, sorted.
pub fn live_cells(model: &Model<Cell>) -> Vec<(i32, i32)> {
    let mut live: Vec<(i32, i32)> = model
        .agents()
        .iter()
        .filter(|(_, c)| c.alive)
        .filter_map(|(id, _)| model.env().position(id))
        .collect();
    live.sort_unstable();
    live
}

/// Build a seeded board. Each cell, in row-major order, starts alive
/// with probability `fill`.
pub fn build(params: &ParamSet, seed: u64) -> Result<Model<Cell>, ConfigError> {
    let width = dim(params, "width", 50)?;
    let height = dim(params, "height", 50)?;
    let fill = params.probability_or("fill", 0.1)?;
    let grid = OrthogonalGrid::new(width, height, true).map_err(space_config)?;

    let collector = DataCollector::builder()
        .model("alive", |m: &Model<Cell>| m.agents().count_where(|c| c.alive).into())
        .build()?;
    let mut model = Model::builder(grid)
        .seed(seed)
        .params(params.clone())
        .activation(Activation::Simultaneous)
        .collector(collector)
        .build()?;

    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let alive = model.rng().bernoulli(fill);
            model
                .create_with(Cell::new(alive), |id, grid, _| {
                    grid.place(id, (x, y))?;
                    Ok(())
                })
                .map_err(setup_config)?;
        }
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_stays_empty() {
        let mut m = build(&ParamSet::new().with("fill", 0.0).with("width", 8i64).with("height", 8i64), 1)
            .unwrap();
        m.run_for(3).unwrap();
        assert!(live_cells(&m).is_empty());
    }

    #[test]
    fn glider_translates_diagonally() {
        let mut m = build(&ParamSet::new().with("fill", 0.0).with("width", 10i64).with("height", 10i64), 1)
            .unwrap();
        let glider = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];
        let ids: Vec<_> = m.agents().ids();
        for id in ids {
            let pos = m.env().position(id).unwrap();
            if glider.contains(&pos) {
                m.agent_mut(id).unwrap().alive = true;
            }
        }
        for _ in 0..4 {
            m.step().unwrap();
            assert_eq!(live_cells(&m).len(), 5);
        }
        // After four generations the glider has moved one cell diagonally.
        let mut moved: Vec<_> = glider.iter().map(|&(x, y)| (x + 1, y + 1)).collect();
        moved.sort_unstable();
        assert_eq!(live_cells(&m), moved);
    }
}
