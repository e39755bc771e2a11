//! The shared spatial contracts.

use std::fmt::Debug;

use flock_core::{AgentId, RandomSource};

use crate::error::SpaceError;

/// Object-safe part of every space: membership and tick boundaries.
///
/// The model holds its spaces behind this trait when it needs to drop a
/// removed agent from all of them, and to freeze topology for the
/// duration of a tick.
pub trait Membership {
    /// Drop the agent from this space. Returns whether it was present.
    ///
    /// Idempotent: removing an absent agent is a no-op returning `false`.
    fn remove(&mut self, agent: AgentId) -> bool;

    /// Whether the agent has a position here.
    fn contains(&self, agent: AgentId) -> bool;

    /// Number of agents placed.
    fn agent_count(&self) -> usize;

    /// Called by the model before any agent is activated in a tick.
    ///
    /// Backends with frozen structure (network topology, layer sets)
    /// start rejecting structural changes here.
    fn begin_tick(&mut self) {}

    /// Called by the model once the tick's queues have been flushed.
    fn end_tick(&mut self) {}
}

/// Placement, movement and neighborhood queries.
pub trait Space: Membership {
    /// Position handle: `(x, y)` cell, hex `(q, r)`, node id or float point.
    type Pos: Copy + PartialEq + Debug;

    /// Neighborhood query options.
    type Query;

    /// Put an unplaced agent at `pos`.
    ///
    /// # Errors
    ///
    /// `OutOfBounds` on a bounded space, `CellOccupied` when the cell is
    /// at capacity, `AlreadyPlaced` when the agent already has a position.
    fn place(&mut self, agent: AgentId, pos: Self::Pos) -> Result<(), SpaceError>;

    /// Move a placed agent to `pos`. Moving to the current position is a
    /// no-op that succeeds even on a full cell.
    ///
    /// # Errors
    ///
    /// `NotPlaced` for an agent without a position, plus the errors of
    /// [`place`](Self::place). On error the agent stays where it was.
    fn move_agent(&mut self, agent: AgentId, pos: Self::Pos) -> Result<(), SpaceError>;

    /// Current position, if placed.
    fn position(&self, agent: AgentId) -> Option<Self::Pos>;

    /// Agents at exactly `pos`.
    fn contents(&self, pos: Self::Pos) -> Result<Vec<AgentId>, SpaceError>;

    /// Whether nothing is at `pos`.
    fn is_empty(&self, pos: Self::Pos) -> Result<bool, SpaceError>;

    /// Positions around `pos` selected by `query`, deduplicated.
    fn neighborhood(&self, pos: Self::Pos, query: &Self::Query)
        -> Result<Vec<Self::Pos>, SpaceError>;

    /// Agents at the positions around `pos` selected by `query`.
    fn neighbors(&self, pos: Self::Pos, query: &Self::Query) -> Result<Vec<AgentId>, SpaceError>;
}

/// Backends made of a finite set of cells.
pub trait DiscreteSpace: Space {
    /// Total number of cells.
    fn cell_count(&self) -> usize;

    /// Every cell in canonical order.
    fn cells(&self) -> Vec<Self::Pos>;

    /// Whether the cell can take one more agent.
    fn has_room(&self, pos: Self::Pos) -> Result<bool, SpaceError>;

    /// Cells with no occupants.
    fn empty_cells(&self) -> Vec<Self::Pos>;

    /// A uniformly chosen empty cell, or `None` when every cell is occupied.
    fn random_empty_cell(&self, rng: &mut RandomSource) -> Option<Self::Pos>;
}
