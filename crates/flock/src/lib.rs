//! Flock: an agent-based modeling runtime.
//!
//! This is the facade crate re-exporting the public API of every Flock
//! sub-crate. For most models, depending on `flock` alone is enough.
//!
//! # Quick start
//!
//! ```rust
//! use flock::prelude::*;
//!
//! // Each agent tosses a coin every tick and keeps its score.
//! struct Gambler {
//!     score: i64,
//! }
//!
//! impl Agent for Gambler {
//!     type Env = ();
//!     fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
//!         self.score += if ctx.rng().bernoulli(0.5) { 1 } else { -1 };
//!         Ok(())
//!     }
//! }
//!
//! let collector = DataCollector::builder()
//!     .model("total", |m: &Model<Gambler>| {
//!         m.agents().iter().map(|(_, g)| g.score).sum::<i64>().into()
//!     })
//!     .build()
//!     .unwrap();
//! let mut model = Model::builder(())
//!     .seed(42)
//!     .collector(collector)
//!     .build()
//!     .unwrap();
//! for _ in 0..10 {
//!     model.create(Gambler { score: 0 });
//! }
//! model.run_for(5).unwrap();
//! model.finish();
//!
//! assert_eq!(model.tick(), TickId(5));
//! // Pre-step collection at ticks 0..=4, plus the final state.
//! assert_eq!(model.collector().unwrap().model_wide().len(), 6);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`core`] | `flock-core` | ids, errors, random source, tables, codecs, parameters |
//! | [`space`] | `flock-space` | grids, hex grid, network, continuous space, property layers |
//! | [`engine`] | `flock-engine` | agents, registry, scheduler, model, collector, batch runner |
//! | [`models`] | `flock-models` | reference models and the named-model catalog |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers, error taxonomy, random source and tabular output
/// (`flock-core`).
pub use flock_core as core;

/// Spatial backends and property layers (`flock-space`).
///
/// Provides the [`space::Space`] trait and the backends
/// [`space::OrthogonalGrid`], [`space::HexGrid`], [`space::Network`] and
/// [`space::Continuous2D`].
pub use flock_space as space;

/// Agents, scheduling, the model harness and data collection
/// (`flock-engine`).
pub use flock_engine as engine;

/// Reference models (`flock-models`).
pub use flock_models as models;

/// Common imports for writing a model.
///
/// ```rust
/// use flock::prelude::*;
/// ```
pub mod prelude {
    // Core
    pub use flock_core::{
        AgentId, CancelToken, ConfigError, ErrorKind, NodeId, OutputFormat, ParamSet,
        ParameterGrid, RandomSource, Record, Table, TickId, Value,
    };

    // Space
    pub use flock_space::{
        Capacity, Continuous2D, DiscreteSpace, GridQuery, HexGrid, HexQuery, Membership, Network,
        NetworkQuery, OrthogonalGrid, Point, PropertyLayer, RadiusQuery, Space, SpaceError,
        StagedLayer,
    };

    // Engine
    pub use flock_engine::{
        Activation, Agent, AgentContext, AgentError, BatchError, BatchRunner, CollectTiming,
        DataCollector, Environment, Model, ModelError, Sampling, StageContext, StepRecovery,
    };
}
