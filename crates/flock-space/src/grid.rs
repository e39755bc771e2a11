//! Square-cell grid with Moore or von Neumann neighborhoods.

use flock_core::{AgentId, RandomSource};
use indexmap::IndexSet;

use crate::edge::{resolve_axis, EdgeBehavior};
use crate::error::SpaceError;
use crate::layer_set::LayerSet;
use crate::occupancy::{Capacity, Occupancy};
use crate::space::{DiscreteSpace, Membership, Space};

/// Shape of a square-grid neighborhood.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Neighborhood {
    /// 8-connected: Chebyshev distance ≤ radius.
    #[default]
    Moore,
    /// 4-connected: Manhattan distance ≤ radius.
    VonNeumann,
}

/// Neighborhood query for [`OrthogonalGrid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridQuery {
    /// Distance in cells.
    pub radius: u32,
    /// Moore or von Neumann.
    pub shape: Neighborhood,
    /// Whether the center cell is part of the result.
    pub include_center: bool,
}

impl GridQuery {
    /// Moore neighborhood of `radius`, center excluded.
    pub fn moore(radius: u32) -> Self {
        Self {
            radius,
            shape: Neighborhood::Moore,
            include_center: false,
        }
    }

    /// Von Neumann neighborhood of `radius`, center excluded.
    pub fn von_neumann(radius: u32) -> Self {
        Self {
            radius,
            shape: Neighborhood::VonNeumann,
            include_center: false,
        }
    }

    /// Same query with the center cell included.
    pub fn with_center(mut self) -> Self {
        self.include_center = true;
        self
    }
}

impl Default for GridQuery {
    fn default() -> Self {
        Self::moore(1)
    }
}

/// A `width × height` grid of square cells addressed by `(x, y)`.
///
/// Cells hold up to [`Capacity`] agents. With `torus` set, every
/// coordinate is taken modulo the grid size and neighborhoods cross the
/// edges; otherwise out-of-range coordinates fail with `OutOfBounds` and
/// neighborhoods are clipped.
///
/// Canonical cell order is row-major: `(0, 0), (1, 0), ..., (w-1, h-1)`.
///
/// # Examples
///
/// ```
/// use flock_core::AgentId;
/// use flock_space::{GridQuery, OrthogonalGrid, Space};
///
/// let mut grid = OrthogonalGrid::new(10, 10, true).unwrap();
/// grid.place(AgentId(0), (0, 0)).unwrap();
/// assert_eq!(grid.neighborhood((0, 0), &GridQuery::moore(1)).unwrap().len(), 8);
///
/// let bounded = OrthogonalGrid::new(10, 10, false).unwrap();
/// assert_eq!(bounded.neighborhood((0, 0), &GridQuery::moore(1)).unwrap().len(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct OrthogonalGrid {
    width: u32,
    height: u32,
    edge: EdgeBehavior,
    occupancy: Occupancy,
    layers: LayerSet,
}

/// Builder for [`OrthogonalGrid`].
#[derive(Clone, Debug)]
pub struct OrthogonalGridBuilder {
    width: u32,
    height: u32,
    torus: bool,
    capacity: Capacity,
}

impl OrthogonalGridBuilder {
    /// Wrap coordinates at the edges.
    pub fn torus(mut self, torus: bool) -> Self {
        self.torus = torus;
        self
    }

    /// Agents per cell.
    pub fn capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Unbounded capacity (a multigrid).
    pub fn multi(self) -> Self {
        self.capacity(Capacity::Unbounded)
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// `EmptySpace` for a zero dimension or `Bounded(0)` capacity;
    /// `DimensionTooLarge` when a side exceeds `i32::MAX`.
    pub fn build(self) -> Result<OrthogonalGrid, SpaceError> {
        if self.width == 0 || self.height == 0 || self.capacity == Capacity::Bounded(0) {
            return Err(SpaceError::EmptySpace);
        }
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value > OrthogonalGrid::MAX_DIM {
                return Err(SpaceError::DimensionTooLarge {
                    name,
                    value: value as u64,
                    max: OrthogonalGrid::MAX_DIM as u64,
                });
            }
        }
        let cells = self.width as usize * self.height as usize;
        Ok(OrthogonalGrid {
            width: self.width,
            height: self.height,
            edge: EdgeBehavior::from_torus(self.torus),
            occupancy: Occupancy::new(cells, self.capacity),
            layers: LayerSet::new(self.width, self.height),
        })
    }
}

impl OrthogonalGrid {
    /// Largest side length: positions use `i32`.
    pub const MAX_DIM: u32 = i32::MAX as u32;

    /// Start configuring a grid. Defaults: bounded, single occupancy.
    pub fn builder(width: u32, height: u32) -> OrthogonalGridBuilder {
        OrthogonalGridBuilder {
            width,
            height,
            torus: false,
            capacity: Capacity::Single,
        }
    }

    /// Single-occupancy grid.
    pub fn new(width: u32, height: u32, torus: bool) -> Result<Self, SpaceError> {
        Self::builder(width, height).torus(torus).build()
    }

    /// Unbounded-capacity grid.
    pub fn multi(width: u32, height: u32, torus: bool) -> Result<Self, SpaceError> {
        Self::builder(width, height).torus(torus).multi().build()
    }

    /// Columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether coordinates wrap.
    pub fn torus(&self) -> bool {
        self.edge.is_torus()
    }

    /// Per-cell capacity.
    pub fn capacity(&self) -> Capacity {
        self.occupancy.capacity()
    }

    /// Property layers aligned with this grid.
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// Mutable property layers.
    pub fn layers_mut(&mut self) -> &mut LayerSet {
        &mut self.layers
    }

    /// Canonical form of `pos`: wrapped on a torus, checked otherwise.
    pub fn normalize(&self, pos: (i32, i32)) -> Result<(i32, i32), SpaceError> {
        match (
            resolve_axis(pos.0, self.width, self.edge),
            resolve_axis(pos.1, self.height, self.edge),
        ) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(SpaceError::out_of_bounds(
                pos,
                format!("[0, {}) x [0, {})", self.width, self.height),
            )),
        }
    }

    fn index(&self, (x, y): (i32, i32)) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn coord(&self, idx: usize) -> (i32, i32) {
        let w = self.width as usize;
        ((idx % w) as i32, (idx / w) as i32)
    }

    /// Occupants of the cell at `pos`, borrowed.
    pub fn cell(&self, pos: (i32, i32)) -> Result<&[AgentId], SpaceError> {
        let p = self.normalize(pos)?;
        Ok(self.occupancy.cell(self.index(p)))
    }

    /// Offsets of a neighborhood in scan order, before edge handling.
    fn offsets(query: &GridQuery) -> impl Iterator<Item = (i32, i32)> + '_ {
        let r = query.radius as i32;
        (-r..=r).flat_map(move |dy| (-r..=r).map(move |dx| (dx, dy))).filter(move |&(dx, dy)| {
            match query.shape {
                Neighborhood::Moore => true,
                Neighborhood::VonNeumann => dx.abs() + dy.abs() <= r,
            }
        })
    }
}

impl Membership for OrthogonalGrid {
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

impl Space for OrthogonalGrid {
    type Pos = (i32, i32);
    type Query = GridQuery;

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
        Ok(self.cell(pos)?.to_vec())
    }

    fn is_empty(&self, pos: (i32, i32)) -> Result<bool, SpaceError> {
        Ok(self.cell(pos)?.is_empty())
    }

    fn neighborhood(
        &self,
        pos: (i32, i32),
        query: &GridQuery,
    ) -> Result<Vec<(i32, i32)>, SpaceError> {
        let center = self.normalize(pos)?;
        let mut out: IndexSet<(i32, i32)> = IndexSet::new();
        for (dx, dy) in Self::offsets(query) {
            let x = resolve_axis(center.0 + dx, self.width, self.edge);
            let y = resolve_axis(center.1 + dy, self.height, self.edge);
            if let (Some(x), Some(y)) = (x, y) {
                if (x, y) != center || query.include_center {
                    out.insert((x, y));
                }
            }
        }
        Ok(out.into_iter().collect())
    }

    fn neighbors(&self, pos: (i32, i32), query: &GridQuery) -> Result<Vec<AgentId>, SpaceError> {
        let cells = self.neighborhood(pos, query)?;
        Ok(cells
            .into_iter()
            .flat_map(|p| self.occupancy.cell(self.index(p)).iter().copied())
            .collect())
    }
}

impl DiscreteSpace for OrthogonalGrid {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;
    use proptest::prelude::*;

    fn a(n: u64) -> AgentId {
        AgentId(n)
    }

    #[test]
    fn compliance_bounded_single() {
        compliance::run_full_compliance(
            || OrthogonalGrid::new(5, 4, false).unwrap(),
            &GridQuery::moore(1),
        );
    }

    #[test]
    fn compliance_torus_multi() {
        compliance::run_full_compliance(
            || OrthogonalGrid::multi(4, 6, true).unwrap(),
            &GridQuery::von_neumann(2),
        );
    }

    #[test]
    fn moore_counts_at_corner_edge_interior() {
        let g = OrthogonalGrid::new(5, 5, false).unwrap();
        let q = GridQuery::moore(1);
        assert_eq!(g.neighborhood((0, 0), &q).unwrap().len(), 3);
        assert_eq!(g.neighborhood((2, 0), &q).unwrap().len(), 5);
        assert_eq!(g.neighborhood((2, 2), &q).unwrap().len(), 8);
    }

    #[test]
    fn von_neumann_counts() {
        let g = OrthogonalGrid::new(7, 7, false).unwrap();
        assert_eq!(g.neighborhood((3, 3), &GridQuery::von_neumann(1)).unwrap().len(), 4);
        assert_eq!(g.neighborhood((3, 3), &GridQuery::von_neumann(2)).unwrap().len(), 12);
        assert_eq!(g.neighborhood((0, 0), &GridQuery::von_neumann(1)).unwrap().len(), 2);
    }

    #[test]
    fn radius_zero_is_center_or_nothing() {
        let g = OrthogonalGrid::new(3, 3, true).unwrap();
        assert!(g.neighborhood((1, 1), &GridQuery::moore(0)).unwrap().is_empty());
        assert_eq!(
            g.neighborhood((1, 1), &GridQuery::moore(0).with_center()).unwrap(),
            vec![(1, 1)]
        );
    }

    #[test]
    fn small_torus_neighborhood_is_deduplicated() {
        let g = OrthogonalGrid::new(2, 2, true).unwrap();
        let n = g.neighborhood((0, 0), &GridQuery::moore(1)).unwrap();
        assert_eq!(n.len(), 3);
        assert!(!n.contains(&(0, 0)));
    }

    #[test]
    fn torus_wraps_placement_and_bounded_rejects() {
        let mut t = OrthogonalGrid::new(4, 4, true).unwrap();
        t.place(a(1), (-1, 5)).unwrap();
        assert_eq!(t.position(a(1)), Some((3, 1)));

        let mut b = OrthogonalGrid::new(4, 4, false).unwrap();
        assert!(matches!(
            b.place(a(1), (4, 0)),
            Err(SpaceError::OutOfBounds { .. })
        ));
        assert!(b.contents((0, -1)).is_err());
    }

    #[test]
    fn neighbors_exclude_own_cell_unless_asked() {
        let mut g = OrthogonalGrid::multi(3, 3, false).unwrap();
        g.place(a(1), (1, 1)).unwrap();
        g.place(a(2), (1, 1)).unwrap();
        g.place(a(3), (0, 0)).unwrap();
        assert_eq!(g.neighbors((1, 1), &GridQuery::moore(1)).unwrap(), vec![a(3)]);
        let mut all = g.neighbors((1, 1), &GridQuery::moore(1).with_center()).unwrap();
        all.sort();
        assert_eq!(all, vec![a(1), a(2), a(3)]);
    }

    #[test]
    fn move_failure_leaves_agent_in_place() {
        let mut g = OrthogonalGrid::new(2, 1, false).unwrap();
        g.place(a(1), (0, 0)).unwrap();
        g.place(a(2), (1, 0)).unwrap();
        assert!(matches!(
            g.move_agent(a(1), (1, 0)),
            Err(SpaceError::CellOccupied { .. })
        ));
        assert_eq!(g.position(a(1)), Some((0, 0)));
        assert!(matches!(
            g.move_agent(a(9), (0, 0)),
            Err(SpaceError::NotPlaced { .. })
        ));
    }

    #[test]
    fn bounded_capacity() {
        let mut g = OrthogonalGrid::builder(1, 1)
            .capacity(Capacity::Bounded(2))
            .build()
            .unwrap();
        g.place(a(1), (0, 0)).unwrap();
        assert!(g.has_room((0, 0)).unwrap());
        g.place(a(2), (0, 0)).unwrap();
        assert!(!g.has_room((0, 0)).unwrap());
        assert!(g.place(a(3), (0, 0)).is_err());
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(
            OrthogonalGrid::new(0, 3, false),
            Err(SpaceError::EmptySpace)
        ));
    }

    proptest! {
        #[test]
        fn torus_moore_is_full_square(w in 3u32..12, h in 3u32..12, x in 0i32..12, y in 0i32..12, r in 1u32..2) {
            let g = OrthogonalGrid::new(w, h, true).unwrap();
            let n = g.neighborhood((x, y), &GridQuery::moore(r)).unwrap();
            prop_assert_eq!(n.len(), 8);
        }

        #[test]
        fn single_occupancy_holds_under_random_moves(
            seed in any::<u64>(),
            moves in prop::collection::vec((0u64..6, 0i32..4, 0i32..4), 0..60),
        ) {
            let mut g = OrthogonalGrid::new(4, 4, false).unwrap();
            let mut rng = RandomSource::new(seed);
            for id in 0..6u64 {
                let cell = g.random_empty_cell(&mut rng).unwrap();
                g.place(a(id), cell).unwrap();
            }
            for (id, x, y) in moves {
                let _ = g.move_agent(a(id), (x, y));
                for cell in g.cells() {
                    prop_assert!(g.cell(cell).unwrap().len() <= 1);
                }
            }
            g.occupancy.assert_consistent();
        }
    }
}
