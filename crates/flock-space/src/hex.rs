//! Hexagonal grid with axial coordinates.

use flock_core::{AgentId, RandomSource};
use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::edge::{resolve_axis, EdgeBehavior};
use crate::error::SpaceError;
use crate::layer_set::LayerSet;
use crate::occupancy::{Capacity, Occupancy};
use crate::space::{DiscreteSpace, Membership, Space};

/// Pointy-top hex offsets in axial `(dq, dr)` order: E, NE, NW, W, SW, SE.
const HEX_OFFSETS: [(i32, i32); 6] = [
    (1, 0),  // E
    (1, -1), // NE
    (0, -1), // NW
    (-1, 0), // W
    (-1, 1), // SW
    (0, 1),  // SE
];

/// Neighborhood query for [`HexGrid`]: a disc of cube radius `radius`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HexQuery {
    /// Cube distance.
    pub radius: u32,
    /// Whether the center cell is part of the result.
    pub include_center: bool,
}

impl HexQuery {
    /// Disc of `radius`, center excluded.
    pub fn radius(radius: u32) -> Self {
        Self {
            radius,
            include_center: false,
        }
    }

    /// Same query with the center included.
    pub fn with_center(mut self) -> Self {
        self.include_center = true;
        self
    }
}

/// A hex grid of `width` columns (q) by `height` rows (r).
///
/// Interior cells have six neighbors; a disc of radius `r` holds
/// `3r(r + 1)` cells besides the center. With `torus` set, q and r
/// wrap independently.
///
/// Distance is cube distance: `max(|dq|, |dr|, |dq + dr|)`.
#[derive(Clone, Debug)]
pub struct HexGrid {
    width: u32,
    height: u32,
    edge: EdgeBehavior,
    occupancy: Occupancy,
    layers: LayerSet,
}

impl HexGrid {
    /// Largest side length: positions use `i32`.
    pub const MAX_DIM: u32 = i32::MAX as u32;

    /// Single-occupancy hex grid.
    pub fn new(width: u32, height: u32, torus: bool) -> Result<Self, SpaceError> {
        Self::with_capacity(width, height, torus, Capacity::Single)
    }

    /// Hex grid with the given per-cell capacity.
    pub fn with_capacity(
        width: u32,
        height: u32,
        torus: bool,
        capacity: Capacity,
    ) -> Result<Self, SpaceError> {
        if width == 0 || height == 0 || capacity == Capacity::Bounded(0) {
            return Err(SpaceError::EmptySpace);
        }
        if width > Self::MAX_DIM || height > Self::MAX_DIM {
            return Err(SpaceError::DimensionTooLarge {
                name: if width > Self::MAX_DIM { "width" } else { "height" },
                value: width.max(height) as u64,
                max: Self::MAX_DIM as u64,
            });
        }
        Ok(Self {
            width,
            height,
            edge: EdgeBehavior::from_torus(torus),
            occupancy: Occupancy::new(width as usize * height as usize, capacity),
            layers: LayerSet::new(width, height),
        })
    }

    /// Columns (q extent).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Rows (r extent).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether coordinates wrap.
    pub fn torus(&self) -> bool {
        self.edge.is_torus()
    }

    /// Property layers, indexed by `(q, r)`.
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// Mutable property layers.
    pub fn layers_mut(&mut self) -> &mut LayerSet {
        &mut self.layers
    }

    /// Canonical form of `pos`.
    pub fn normalize(&self, pos: (i32, i32)) -> Result<(i32, i32), SpaceError> {
        match (
            resolve_axis(pos.0, self.width, self.edge),
            resolve_axis(pos.1, self.height, self.edge),
        ) {
            (Some(q), Some(r)) => Ok((q, r)),
            _ => Err(SpaceError::out_of_bounds(
                pos,
                format!("q in [0, {}), r in [0, {})", self.width, self.height),
            )),
        }
    }

    /// The up-to-six adjacent cells of `pos`.
    pub fn adjacent(&self, pos: (i32, i32)) -> Result<SmallVec<[(i32, i32); 6]>, SpaceError> {
        let (q, r) = self.normalize(pos)?;
        let mut out = SmallVec::new();
        for (dq, dr) in HEX_OFFSETS {
            let nq = resolve_axis(q + dq, self.width, self.edge);
            let nr = resolve_axis(r + dr, self.height, self.edge);
            if let (Some(nq), Some(nr)) = (nq, nr) {
                if (nq, nr) != (q, r) && !out.contains(&(nq, nr)) {
                    out.push((nq, nr));
                }
            }
        }
        Ok(out)
    }

    /// Cube distance, ignoring wrap.
    pub fn distance(a: (i32, i32), b: (i32, i32)) -> u32 {
        let dq = a.0 - b.0;
        let dr = a.1 - b.1;
        dq.unsigned_abs()
            .max(dr.unsigned_abs())
            .max((dq + dr).unsigned_abs())
    }

    fn index(&self, (q, r): (i32, i32)) -> usize {
        r as usize * self.width as usize + q as usize
    }

    fn coord(&self, idx: usize) -> (i32, i32) {
        let w = self.width as usize;
        ((idx % w) as i32, (idx / w) as i32)
    }
}

impl Membership for HexGrid {
    fn remove(&mut self, agent: AgentId) -> bool {
        self.occupancy.remove(agent)
    }

    fn contains(&self, agent: AgentId) -> bool {
        self.occupancy.index_of(agent).is_some()
    }

    fn agent_count(&self) -> usize {
        self.occupancy.len()
    }

    fn begin_tick(&mut self) {
        self.layers.set_frozen(true);
    }

    fn end_tick(&mut self) {
        self.layers.set_frozen(false);
    }
}

impl Space for HexGrid {
    type Pos = (i32, i32);
    type Query = HexQuery;

    fn place(&mut self, agent: AgentId, pos: (i32, i32)) -> Result<(), SpaceError> {
        let p = self.normalize(pos)?;
        let idx = self.index(p);
        self.occupancy.place(agent, idx, p)
    }

    fn move_agent(&mut self, agent: AgentId, pos: (i32, i32)) -> Result<(), SpaceError> {
        let p = self.normalize(pos)?;
        let idx = self.index(p);
        self.occupancy.relocate(agent, idx, p)
    }

    fn position(&self, agent: AgentId) -> Option<(i32, i32)> {
        self.occupancy.index_of(agent).map(|i| self.coord(i))
    }

    fn contents(&self, pos: (i32, i32)) -> Result<Vec<AgentId>, SpaceError> {
        let p = self.normalize(pos)?;
        Ok(self.occupancy.cell(self.index(p)).to_vec())
    }

    fn is_empty(&self, pos: (i32, i32)) -> Result<bool, SpaceError> {
        let p = self.normalize(pos)?;
        Ok(self.occupancy.is_empty_cell(self.index(p)))
    }

    fn neighborhood(
        &self,
        pos: (i32, i32),
        query: &HexQuery,
    ) -> Result<Vec<(i32, i32)>, SpaceError> {
        let center = self.normalize(pos)?;
        let r = query.radius as i32;
        let mut out: IndexSet<(i32, i32)> = IndexSet::new();
        for dq in -r..=r {
            for dr in (-r).max(-dq - r)..=r.min(-dq + r) {
                let q = resolve_axis(center.0 + dq, self.width, self.edge);
                let rr = resolve_axis(center.1 + dr, self.height, self.edge);
                if let (Some(q), Some(rr)) = (q, rr) {
                    if (q, rr) != center || query.include_center {
                        out.insert((q, rr));
                    }
                }
            }
        }
        Ok(out.into_iter().collect())
    }

    fn neighbors(&self, pos: (i32, i32), query: &HexQuery) -> Result<Vec<AgentId>, SpaceError> {
        Ok(self
            .neighborhood(pos, query)?
            .into_iter()
            .flat_map(|p| self.occupancy.cell(self.index(p)).iter().copied())
            .collect())
    }
}

impl DiscreteSpace for HexGrid {
    fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn cells(&self) -> Vec<(i32, i32)> {
        (0..self.cell_count()).map(|i| self.coord(i)).collect()
    }

    fn has_room(&self, pos: (i32, i32)) -> Result<bool, SpaceError> {
        let p = self.normalize(pos)?;
        Ok(self.occupancy.has_room(self.index(p)))
    }

    fn empty_cells(&self) -> Vec<(i32, i32)> {
        let mut cells: Vec<usize> = self.occupancy.empties().collect();
        cells.sort_unstable();
        cells.into_iter().map(|i| self.coord(i)).collect()
    }

    fn random_empty_cell(&self, rng: &mut RandomSource) -> Option<(i32, i32)> {
        self.occupancy.random_empty(rng).map(|i| self.coord(i))
    }
}
