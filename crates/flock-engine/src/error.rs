//! Errors raised by agent code, the model harness and the batch runner.

use std::error::Error as StdError;

use flock_core::{AgentId, ConfigError, ErrorKind, TickId};
use flock_space::SpaceError;
use thiserror::Error;

/// Failure returned from user agent code (`step`, `stage`, `commit`) or
/// from a model hook.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A space operation failed.
    #[error(transparent)]
    Space(#[from] SpaceError),
    /// A parameter or configuration problem surfaced mid-run.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Free-form failure raised by model code.
    #[error("{0}")]
    Failed(String),
    /// Any other error from model code.
    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl AgentError {
    /// Shorthand for [`AgentError::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Failure class, looking through wrapped space and config errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Space(e) => e.kind(),
            Self::Config(e) => e.kind(),
            Self::Failed(_) | Self::Other(_) => ErrorKind::StepFailure,
        }
    }
}

/// Errors surfaced by [`Model`](crate::Model) construction and stepping.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A space operation performed by the harness failed.
    #[error(transparent)]
    Space(#[from] SpaceError),
    /// An agent's activation failed and the recovery policy aborted the tick.
    #[error("agent {agent} failed at tick {tick}: {source}")]
    StepFailure {
        /// The failing agent.
        agent: AgentId,
        /// The tick that was aborted.
        tick: TickId,
        /// What the agent reported.
        #[source]
        source: AgentError,
    },
    /// A before/after step hook failed.
    #[error("step hook failed at tick {tick}: {source}")]
    HookFailure {
        /// The tick that was aborted.
        tick: TickId,
        /// What the hook reported.
        #[source]
        source: AgentError,
    },
    /// The run was cancelled through its token.
    #[error("run cancelled at tick {tick}")]
    Cancelled {
        /// Last completed tick.
        tick: TickId,
    },
}

impl ModelError {
    /// Failure class for structured reporting.
    ///
    /// A step failure reports the class of its cause when the agent
    /// bubbled up a space or config error, so an agent walking into an
    /// occupied cell still reads as `cell_occupied`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Space(e) => e.kind(),
            Self::StepFailure { source, .. } | Self::HookFailure { source, .. } => source.kind(),
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Tick at which the error occurred, when known.
    pub fn tick(&self) -> Option<TickId> {
        match self {
            Self::StepFailure { tick, .. }
            | Self::HookFailure { tick, .. }
            | Self::Cancelled { tick } => Some(*tick),
            _ => None,
        }
    }

    /// Failing agent, for step failures.
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            Self::StepFailure { agent, .. } => Some(*agent),
            _ => None,
        }
    }
}

/// Errors surfaced by [`BatchRunner::run`](crate::BatchRunner::run).
#[derive(Debug, Error)]
pub enum BatchError {
    /// The runner itself is misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The model factory rejected a parameter combination.
    #[error("run {run}: model construction failed: {source}")]
    Build {
        /// Run index.
        run: usize,
        /// Factory error.
        #[source]
        source: ConfigError,
    },
    /// A run failed while stepping.
    #[error("run {run}: {source}")]
    Run {
        /// Run index.
        run: usize,
        /// Model error.
        #[source]
        source: ModelError,
    },
    /// The sweep was cancelled before all runs completed.
    #[error("batch cancelled after {completed} of {total} runs")]
    Cancelled {
        /// Runs that finished.
        completed: usize,
        /// Runs scheduled.
        total: usize,
    },
}

impl BatchError {
    /// Failure class for structured reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) | Self::Build { source: e, .. } => e.kind(),
            Self::Run { source, .. } => source.kind(),
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}
