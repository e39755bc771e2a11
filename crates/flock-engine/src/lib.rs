//! Model harness for Flock agent-based models.
//!
//! Ties agents, spaces and data collection together:
//!
//! - [`Agent`] and [`Environment`]: the traits model code implements.
//! - [`AgentRegistry`]: identity, lookup and ordered iteration.
//! - [`Scheduler`]: activation policies and failure recovery.
//! - [`Model`]: tick loop, step hooks, run-to-termination helpers.
//! - [`DataCollector`]: reporters and event tables.
//! - [`BatchRunner`]: parameter sweeps on a worker pool.
//!
//! A model is single-threaded: agents activate one at a time, each with
//! exclusive access to its own state. Parallelism lives only in the
//! batch runner, which runs whole independent models on separate threads.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod batch;
pub mod collector;
pub mod context;
pub mod error;
pub mod model;
pub mod registry;
pub mod scheduler;

pub use agent::{Agent, Environment};
pub use batch::{BatchRunner, Sampling, RUN_COLUMNS};
pub use collector::{DataCollector, DataCollectorBuilder};
pub use context::{AgentContext, Parts, StageContext};
pub use error::{AgentError, BatchError, ModelError};
pub use model::{CollectTiming, Hook, Model, ModelBuilder};
pub use registry::{AgentRegistry, AgentStatus};
pub use scheduler::{Activation, Scheduler, StepRecovery};
