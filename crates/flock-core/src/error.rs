//! Error taxonomy shared across the workspace.
//!
//! [`ErrorKind`] names the failure classes every layer reports in terms
//! of; concrete error enums (`ConfigError` here, `SpaceError` and
//! `ModelError` downstream) each expose a `kind()` mapping into it.

use std::fmt;

use thiserror::Error;

/// Failure classes surfaced to callers and the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid parameters, shape mismatch, duplicate names, missing seed.
    Config,
    /// Out-of-range coordinates on a bounded space.
    Bounds,
    /// Placement into a full cell.
    CellOccupied,
    /// Operation on an agent with no spatial membership.
    NotPlaced,
    /// Structural change attempted while a tick is in progress.
    MutationDuringTick,
    /// User agent code failed during activation.
    StepFailure,
    /// A run was cancelled through its token.
    Cancelled,
}

impl ErrorKind {
    /// Stable snake_case label used in structured output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Bounds => "bounds",
            Self::CellOccupied => "cell_occupied",
            Self::NotPlaced => "not_placed",
            Self::MutationDuringTick => "mutation_during_tick",
            Self::StepFailure => "step_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors detected at construction or parameter parsing.
///
/// These are never recoverable by the runtime; they surface immediately
/// to whoever assembled the model.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A parameter has the wrong type or an out-of-range value.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A required parameter was not supplied.
    #[error("missing parameter '{name}'")]
    MissingParameter {
        /// Parameter name.
        name: String,
    },
    /// Reproducibility was requested but no seed was given.
    #[error("a seed is required for reproducible runs")]
    Unseeded,
    /// Two reporters (or tables) share a name.
    #[error("duplicate reporter name '{name}'")]
    DuplicateReporter {
        /// The repeated name.
        name: String,
    },
    /// A layer with this name is already attached.
    #[error("duplicate layer name '{name}'")]
    DuplicateLayer {
        /// The repeated name.
        name: String,
    },
    /// Array shape does not match the grid or layer it targets.
    #[error("shape mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    ShapeMismatch {
        /// Expected width.
        expected_width: u32,
        /// Expected height.
        expected_height: u32,
        /// Supplied width.
        width: u32,
        /// Supplied height.
        height: u32,
    },
    /// Row length does not match the table's column count.
    #[error("row has {actual} values but table has {expected} columns")]
    RowWidth {
        /// Column count.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },
    /// A space could not be constructed with the given dimensions.
    #[error("invalid space: {reason}")]
    InvalidSpace {
        /// Description of the problem.
        reason: String,
    },
    /// The requested model name is not in the catalog.
    #[error("unknown model '{name}'")]
    UnknownModel {
        /// The requested name.
        name: String,
    },
}

impl ConfigError {
    /// Always [`ErrorKind::Config`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }

    /// Shorthand for [`ConfigError::InvalidParameter`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
