//! Predator–prey with grass.
//!
//! Sheep graze, wolves hunt sheep, both lose one unit of energy per tick
//! and split their energy with offspring when they reproduce. A sheep
//! that grazes can recover from negative energy; a wolf cannot hunt once
//! it has starved. Grass is a
//! pair of grid layers: `grass` (grown or not) and `countdown` (ticks
//! until a grazed cell regrows), advanced by a before-step hook.

use flock_core::{AgentId, ConfigError, ParamSet, Value};
use flock_engine::{
    Activation, Agent, AgentContext, AgentError, DataCollector, Environment, Model,
};
use flock_space::walk::random_move;
use flock_space::{GridQuery, Membership, OrthogonalGrid, Space, SpaceError};

use crate::{dim, setup_config, space_config};

/// Catalog name.
pub const NAME: &str = "wolf_sheep";

/// Grown-grass layer.
pub const GRASS: &str = "grass";
/// Regrowth countdown layer.
pub const COUNTDOWN: &str = "countdown";

/// Shared world: the grid plus the rates every animal reads.
#[derive(Debug)]
pub struct Pasture {
    /// Multi-occupancy torus carrying the grass layers.
    pub grid: OrthogonalGrid,
    /// Whether grass (and sheep starvation) is modeled.
    pub grass: bool,
    /// Ticks for grazed grass to regrow.
    pub regrowth: i64,
    /// Energy a sheep gains from grass.
    pub sheep_gain: i64,
    /// Energy a wolf gains from a sheep.
    pub wolf_gain: i64,
    /// Per-tick reproduction probability for sheep.
    pub sheep_reproduce: f64,
    /// Per-tick reproduction probability for wolves.
    pub wolf_reproduce: f64,
}

impl Environment for Pasture {
    fn visit_spaces(&mut self, f: &mut dyn FnMut(&mut dyn Membership)) {
        f(&mut self.grid);
    }
}

impl Pasture {
    /// Graze at `pos`. Returns whether there was grass to eat.
    fn graze(&mut self, pos: (i32, i32)) -> Result<bool, SpaceError> {
        let layers = self.grid.layers_mut();
        let Some(grass) = layers.get_mut::<bool>(GRASS) else {
            return Ok(false);
        };
        if !grass.get(pos.0, pos.1)? {
            return Ok(false);
        }
        grass.set(pos.0, pos.1, false)?;
        if let Some(countdown) = layers.get_mut::<i64>(COUNTDOWN) {
            countdown.set(pos.0, pos.1, self.regrowth)?;
        }
        Ok(true)
    }

    /// Advance every regrowth countdown by one tick.
    fn regrow(&mut self) -> Result<(), SpaceError> {
        let (w, h) = (self.grid.width(), self.grid.height());
        let layers = self.grid.layers_mut();
        let Some(countdown) = layers.get_mut::<i64>(COUNTDOWN) else {
            return Ok(());
        };
        countdown.apply(|c| (c - 1).max(0));
        let grown: Vec<bool> = countdown.as_slice().iter().map(|&c| c == 0).collect();
        if let Some(grass) = layers.get_mut::<bool>(GRASS) {
            grass.replace(w, h, grown)?;
        }
        Ok(())
    }

    /// Number of grown cells.
    pub fn grown(&self) -> usize {
        self.grid
            .layers()
            .get::<bool>(GRASS)
            .map_or(0, |g| g.count_where(|v| v))
    }
}

/// A grazing or hunting animal.
#[derive(Clone, Debug, PartialEq)]
pub enum Critter {
    /// Prey.
    Sheep {
        /// Remaining energy; the sheep dies below zero.
        energy: i64,
    },
    /// Predator.
    Wolf {
        /// Remaining energy; the wolf dies below zero.
        energy: i64,
    },
}

impl Critter {
    /// Current energy.
    pub fn energy(&self) -> i64 {
        match self {
            Self::Sheep { energy } | Self::Wolf { energy } => *energy,
        }
    }

    fn energy_mut(&mut self) -> &mut i64 {
        match self {
            Self::Sheep { energy } | Self::Wolf { energy } => energy,
        }
    }

    /// Whether this is a sheep.
    pub fn is_sheep(&self) -> bool {
        matches!(self, Self::Sheep { .. })
    }

    fn offspring(&self, energy: i64) -> Self {
        match self {
            Self::Sheep { .. } => Self::Sheep { energy },
            Self::Wolf { .. } => Self::Wolf { energy },
        }
    }
}

impl Agent for Critter {
    type Env = Pasture;

    fn type_tag(&self) -> &'static str {
        match self {
            Self::Sheep { .. } => "sheep",
            Self::Wolf { .. } => "wolf",
        }
    }

    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        let id = ctx.id();
        {
            let parts = ctx.parts();
            random_move(&mut parts.env.grid, id, &GridQuery::moore(1), parts.rng)?;
        }
        let here = ctx
            .env()
            .grid
            .position(id)
            .ok_or(SpaceError::NotPlaced { agent: id })?;

        let reproduce = match self {
            Self::Sheep { energy } => {
                if ctx.env().grass {
                    *energy -= 1;
                    if ctx.env_mut().graze(here)? {
                        *energy += ctx.env().sheep_gain;
                    }
                }
                ctx.env().sheep_reproduce
            }
            Self::Wolf { energy } => {
                *energy -= 1;
                // A wolf that starves this tick dies before it can hunt.
                if *energy < 0 {
                    ctx.remove_self();
                    return Ok(());
                }
                let prey: Vec<AgentId> = ctx
                    .env()
                    .grid
                    .contents(here)?
                    .into_iter()
                    .filter(|&o| ctx.agent(o).is_some_and(Critter::is_sheep))
                    .collect();
                if let Some(&victim) = ctx.rng().choose(&prey) {
                    ctx.remove(victim);
                    *energy += ctx.env().wolf_gain;
                }
                ctx.env().wolf_reproduce
            }
        };

        if self.energy() < 0 {
            ctx.remove_self();
            return Ok(());
        }
        if ctx.rng().bernoulli(reproduce) {
            let half = self.energy() / 2;
            *self.energy_mut() = half;
            let child = self.offspring(half);
            ctx.create_with(child, |cid, env, _| {
                env.grid.place(cid, here)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "energy" => Some(self.energy().into()),
            "kind" => Some(self.type_tag().into()),
            _ => None,
        }
    }
}

/// Default parameters.
pub fn defaults() -> ParamSet {
    ParamSet::new()
        .with("width", 20i64)
        .with("height", 20i64)
        .with("initial_sheep", 100i64)
        .with("initial_wolves", 25i64)
        .with("sheep_reproduce", 0.04)
        .with("wolf_reproduce", 0.05)
        .with("sheep_gain", 4i64)
        .with("wolf_gain", 20i64)
        .with("grass", true)
        .with("regrowth", 30i64)
}

/// Build a seeded predator–prey model.
///
/// Initial energies are uniform in `[0, 2 * gain]`. Each cell starts
/// grown with probability one half; otherwise its countdown is uniform
/// in `[1, regrowth]`.
pub fn build(params: &ParamSet, seed: u64) -> Result<Model<Critter>, ConfigError> {
    let width = dim(params, "width", 20)?;
    let height = dim(params, "height", 20)?;
    let initial_sheep = params.usize_or("initial_sheep", 100)?;
    let initial_wolves = params.usize_or("initial_wolves", 25)?;
    let regrowth = params.i64_or("regrowth", 30)?;
    if regrowth < 1 {
        return Err(ConfigError::invalid("regrowth", "must be at least 1"));
    }
    let mut grid = OrthogonalGrid::multi(width, height, true).map_err(space_config)?;
    let grass = params.bool_or("grass", true)?;
    if grass {
        grid.layers_mut().create(GRASS, true).map_err(space_config)?;
        grid.layers_mut().create(COUNTDOWN, 0i64).map_err(space_config)?;
    }
    let pasture = Pasture {
        grid,
        grass,
        regrowth,
        sheep_gain: params.i64_or("sheep_gain", 4)?,
        wolf_gain: params.i64_or("wolf_gain", 20)?,
        sheep_reproduce: params.probability_or("sheep_reproduce", 0.04)?,
        wolf_reproduce: params.probability_or("wolf_reproduce", 0.05)?,
    };

    let collector = DataCollector::builder()
        .model("wolves", |m: &Model<Critter>| m.agents().count_type("wolf").into())
        .model("sheep", |m: &Model<Critter>| m.agents().count_type("sheep").into())
        .model("grass", |m: &Model<Critter>| m.env().grown().into())
        .attribute("kind")
        .attribute("energy")
        .build()?;
    let mut model = Model::builder(pasture)
        .seed(seed)
        .params(params.clone())
        .activation(Activation::RandomByType {
            shuffle_types: false,
        })
        .collector(collector)
        .before_step(|m: &mut Model<Critter>| {
            if m.env().grass {
                m.env_mut().regrow()?;
            }
            Ok(())
        })
        .build()?;

    if grass {
        let (env, rng) = model.env_and_rng();
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for _ in 0..width * height {
            let grown = rng.bernoulli(0.5);
            cells.push(if grown { 0 } else { rng.int_range(1, regrowth) });
        }
        let layers = env.grid.layers_mut();
        if let Some(countdown) = layers.get_mut::<i64>(COUNTDOWN) {
            countdown.replace(width, height, cells.clone())?;
        }
        if let Some(g) = layers.get_mut::<bool>(GRASS) {
            g.replace(width, height, cells.iter().map(|&c| c == 0).collect())?;
        }
    }

    let sheep_gain = model.env().sheep_gain;
    let wolf_gain = model.env().wolf_gain;
    let spawn = |model: &mut Model<Critter>, make: &dyn Fn(i64) -> Critter, gain: i64| {
        let energy = model.rng().int_range(0, 2 * gain);
        model
            .create_with(make(energy), |id, env, rng| {
                let x = rng.int_range(0, i64::from(width) - 1) as i32;
                let y = rng.int_range(0, i64::from(height) - 1) as i32;
                env.grid.place(id, (x, y))?;
                Ok(())
            })
            .map(|_| ())
            .map_err(setup_config)
    };
    for _ in 0..initial_sheep {
        spawn(&mut model, &|energy| Critter::Sheep { energy }, sheep_gain)?;
    }
    for _ in 0..initial_wolves {
        spawn(&mut model, &|energy| Critter::Wolf { energy }, wolf_gain)?;
    }
    Ok(model)
}
