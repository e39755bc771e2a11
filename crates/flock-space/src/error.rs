//! Error types for space operations.

use flock_core::{AgentId, ConfigError, ErrorKind, NodeId};
use thiserror::Error;

/// Errors arising from space construction, placement and queries.
///
/// `CellOccupied` and `NotPlaced` are expected outcomes that agent code
/// may handle; the rest usually indicate a modeling bug.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SpaceError {
    /// A position is outside a bounded space.
    #[error("position {pos} out of bounds: {bounds}")]
    OutOfBounds {
        /// The offending position, formatted.
        pos: String,
        /// Human-readable description of the valid range.
        bounds: String,
    },
    /// The target cell is at capacity.
    #[error("cell {pos} is full")]
    CellOccupied {
        /// The full cell, formatted.
        pos: String,
    },
    /// The agent has no position in this space.
    #[error("agent {agent} is not placed in this space")]
    NotPlaced {
        /// The agent.
        agent: AgentId,
    },
    /// The agent already has a position in this space; use `move_agent`.
    #[error("agent {agent} is already placed in this space")]
    AlreadyPlaced {
        /// The agent.
        agent: AgentId,
    },
    /// Structural change attempted while a tick is in progress.
    #[error("cannot change {what} while a tick is in progress")]
    MutationDuringTick {
        /// What was being changed.
        what: &'static str,
    },
    /// A node id that this network never allocated.
    #[error("unknown node {node}")]
    UnknownNode {
        /// The node.
        node: NodeId,
    },
    /// Self-loop on a network that does not allow them.
    #[error("self-loop on node {node} is not allowed")]
    SelfLoop {
        /// The node.
        node: NodeId,
    },
    /// Edge weight is negative or not finite.
    #[error("invalid edge weight {weight}")]
    InvalidWeight {
        /// The weight.
        weight: f64,
    },
    /// A query parameter is unusable (negative or non-finite radius).
    #[error("invalid query: {reason}")]
    InvalidQuery {
        /// What is wrong with it.
        reason: String,
    },
    /// Attempted to construct a space with zero extent.
    #[error("space must have at least one cell")]
    EmptySpace,
    /// A dimension exceeds what positions can address.
    #[error("{name} = {value} exceeds maximum {max}")]
    DimensionTooLarge {
        /// Which dimension.
        name: &'static str,
        /// Requested size.
        value: u64,
        /// Largest permitted size.
        max: u64,
    },
    /// Layer or shape configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SpaceError {
    /// Map to the shared failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfBounds { .. } | Self::UnknownNode { .. } => ErrorKind::Bounds,
            Self::CellOccupied { .. } => ErrorKind::CellOccupied,
            Self::NotPlaced { .. } => ErrorKind::NotPlaced,
            Self::MutationDuringTick { .. } => ErrorKind::MutationDuringTick,
            Self::AlreadyPlaced { .. }
            | Self::SelfLoop { .. }
            | Self::InvalidWeight { .. }
            | Self::InvalidQuery { .. }
            | Self::EmptySpace
            | Self::DimensionTooLarge { .. }
            | Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn out_of_bounds(pos: impl std::fmt::Debug, bounds: String) -> Self {
        Self::OutOfBounds {
            pos: format!("{pos:?}"),
            bounds,
        }
    }

    pub(crate) fn occupied(pos: impl std::fmt::Debug) -> Self {
        Self::CellOccupied {
            pos: format!("{pos:?}"),
        }
    }
}
