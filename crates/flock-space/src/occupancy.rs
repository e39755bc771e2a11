//! Cell occupancy shared by the discrete backends.

use std::fmt::Debug;

use flock_core::{AgentId, RandomSource};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use crate::error::SpaceError;

/// How many agents a cell may hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Capacity {
    /// At most one agent per cell.
    #[default]
    Single,
    /// At most `k` agents per cell.
    Bounded(usize),
    /// Any number of agents.
    Unbounded,
}

impl Capacity {
    /// Whether a cell already holding `len` agents can take one more.
    pub fn admits(self, len: usize) -> bool {
        match self {
            Self::Single => len == 0,
            Self::Bounded(k) => len < k,
            Self::Unbounded => true,
        }
    }
}

/// Agents per cell plus the reverse index.
///
/// Cells are dense indices; each backend maps its positions onto them.
/// The empty set is maintained incrementally so random empty-cell
/// selection is O(1).
#[derive(Clone, Debug)]
pub(crate) struct Occupancy {
    cells: Vec<SmallVec<[AgentId; 1]>>,
    positions: IndexMap<AgentId, usize>,
    empties: IndexSet<usize>,
    capacity: Capacity,
}

impl Occupancy {
    pub(crate) fn new(cell_count: usize, capacity: Capacity) -> Self {
        Self {
            cells: vec![SmallVec::new(); cell_count],
            positions: IndexMap::new(),
            empties: (0..cell_count).collect(),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Append one empty cell (network nodes grow the cell set).
    pub(crate) fn push_cell(&mut self) -> usize {
        let idx = self.cells.len();
        self.cells.push(SmallVec::new());
        self.empties.insert(idx);
        idx
    }

    pub(crate) fn cell(&self, idx: usize) -> &[AgentId] {
        &self.cells[idx]
    }

    pub(crate) fn index_of(&self, agent: AgentId) -> Option<usize> {
        self.positions.get(&agent).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn has_room(&self, idx: usize) -> bool {
        self.capacity.admits(self.cells[idx].len())
    }

    pub(crate) fn is_empty_cell(&self, idx: usize) -> bool {
        self.cells[idx].is_empty()
    }

    pub(crate) fn empties(&self) -> impl Iterator<Item = usize> + '_ {
        self.empties.iter().copied()
    }

    pub(crate) fn random_empty(&self, rng: &mut RandomSource) -> Option<usize> {
        let i = rng.index(self.empties.len())?;
        self.empties.get_index(i).copied()
    }

    pub(crate) fn place(
        &mut self,
        agent: AgentId,
        idx: usize,
        pos: impl Debug,
    ) -> Result<(), SpaceError> {
        if self.positions.contains_key(&agent) {
            return Err(SpaceError::AlreadyPlaced { agent });
        }
        if !self.has_room(idx) {
            return Err(SpaceError::occupied(pos));
        }
        self.attach(agent, idx);
        Ok(())
    }

    pub(crate) fn relocate(
        &mut self,
        agent: AgentId,
        idx: usize,
        pos: impl Debug,
    ) -> Result<(), SpaceError> {
        let from = self
            .index_of(agent)
            .ok_or(SpaceError::NotPlaced { agent })?;
        if from == idx {
            return Ok(());
        }
        if !self.has_room(idx) {
            return Err(SpaceError::occupied(pos));
        }
        self.detach(agent, from);
        self.attach(agent, idx);
        Ok(())
    }

    pub(crate) fn remove(&mut self, agent: AgentId) -> bool {
        match self.positions.swap_remove(&agent) {
            Some(idx) => {
                self.detach(agent, idx);
                true
            }
            None => false,
        }
    }

    fn attach(&mut self, agent: AgentId, idx: usize) {
        self.cells[idx].push(agent);
        self.positions.insert(agent, idx);
        self.empties.swap_remove(&idx);
    }

    fn detach(&mut self, agent: AgentId, idx: usize) {
        let cell = &mut self.cells[idx];
        if let Some(i) = cell.iter().position(|&a| a == agent) {
            cell.remove(i);
        }
        if cell.is_empty() {
            self.empties.insert(idx);
        }
    }

    /// Check internal consistency. Test-only.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (idx, cell) in self.cells.iter().enumerate() {
            assert!(
                cell.len() <= 1 || self.capacity != Capacity::Single,
                "cell {idx} holds {} agents under single occupancy",
                cell.len()
            );
            if let Capacity::Bounded(k) = self.capacity {
                assert!(cell.len() <= k, "cell {idx} over capacity {k}");
            }
            assert_eq!(cell.is_empty(), self.empties.contains(&idx));
            for a in cell {
                assert_eq!(self.positions.get(a), Some(&idx));
            }
        }
        let total: usize = self.cells.iter().map(|c| c.len()).sum();
        assert_eq!(total, self.positions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(n: u64) -> AgentId {
        AgentId(n)
    }

    #[test]
    fn single_capacity_rejects_second_agent() {
        let mut o = Occupancy::new(4, Capacity::Single);
        o.place(a(1), 0, 0).unwrap();
        assert!(matches!(
            o.place(a(2), 0, 0),
            Err(SpaceError::CellOccupied { .. })
        ));
        assert!(matches!(
            o.place(a(1), 1, 1),
            Err(SpaceError::AlreadyPlaced { .. })
        ));
        o.assert_consistent();
    }

    #[test]
    fn relocate_keeps_empties_in_sync() {
        let mut o = Occupancy::new(3, Capacity::Bounded(2));
        o.place(a(1), 0, 0).unwrap();
        o.place(a(2), 0, 0).unwrap();
        assert_eq!(o.empties().count(), 2);
        o.relocate(a(1), 2, 2).unwrap();
        o.relocate(a(2), 2, 2).unwrap();
        assert!(o.is_empty_cell(0));
        assert!(!o.has_room(2));
        o.assert_consistent();
    }

    #[test]
    fn relocate_to_same_cell_is_noop_even_when_full() {
        let mut o = Occupancy::new(1, Capacity::Single);
        o.place(a(1), 0, 0).unwrap();
        o.relocate(a(1), 0, 0).unwrap();
        assert_eq!(o.cell(0), &[a(1)]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut o = Occupancy::new(2, Capacity::Unbounded);
        o.place(a(1), 1, 1).unwrap();
        assert!(o.remove(a(1)));
        assert!(!o.remove(a(1)));
        assert_eq!(o.len(), 0);
        o.assert_consistent();
    }

    #[test]
    fn random_empty_on_full_is_none() {
        let mut o = Occupancy::new(2, Capacity::Single);
        o.place(a(1), 0, 0).unwrap();
        o.place(a(2), 1, 1).unwrap();
        let mut rng = RandomSource::new(0);
        assert_eq!(o.random_empty(&mut rng), None);
    }
}
