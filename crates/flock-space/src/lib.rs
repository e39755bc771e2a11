//! Spatial backends for Flock agent-based models.
//!
//! Every backend records which agents it hosts and where; agents never
//! store their own position. The shared contract is split in three:
//!
//! - [`Membership`]: object-safe removal and tick-boundary hooks, so a
//!   model can drop a removed agent from every space it belongs to.
//! - [`Space`]: placement, movement and neighborhood queries over the
//!   backend's own position and query types.
//! - [`DiscreteSpace`]: cell enumeration and empty-cell selection for
//!   backends made of cells.
//!
//! # Backends
//!
//! - [`OrthogonalGrid`]: square cells, Moore or von Neumann neighborhoods,
//!   optional torus, per-cell capacity.
//! - [`HexGrid`]: axial hex cells, optional torus.
//! - [`Network`]: graph nodes as cells, hop or weighted-distance queries.
//! - [`Continuous2D`]: float positions with a bucketed spatial index.
//!
//! Grid backends carry a [`LayerSet`] of dense [`PropertyLayer`]s.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod continuous;
pub mod edge;
pub mod error;
pub mod grid;
pub mod hex;
pub mod layer;
pub mod layer_set;
pub mod network;
pub mod occupancy;
pub mod space;
pub mod walk;

#[cfg(test)]
pub(crate) mod compliance;

pub use continuous::{Continuous2D, Point, RadiusQuery};
pub use edge::EdgeBehavior;
pub use error::SpaceError;
pub use grid::{GridQuery, Neighborhood, OrthogonalGrid, OrthogonalGridBuilder};
pub use hex::{HexGrid, HexQuery};
pub use layer::{LayerValue, LayerView, PropertyLayer, Rect, StagedLayer};
pub use layer_set::{Layer, LayerAccess, LayerSet};
pub use network::{Network, NetworkBuilder, NetworkQuery};
pub use occupancy::Capacity;
pub use space::{DiscreteSpace, Membership, Space};
