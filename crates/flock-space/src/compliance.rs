//! Contract checks shared by every discrete backend's tests.

use flock_core::{AgentId, RandomSource};
use indexmap::IndexSet;

use crate::space::DiscreteSpace;

/// `b ∈ N(a)` implies `a ∈ N(b)` for every pair of cells.
pub fn assert_neighborhood_symmetric<S: DiscreteSpace>(space: &S, query: &S::Query) {
    for a in space.cells() {
        for b in space.neighborhood(a, query).expect("in-bounds cell") {
            let back = space.neighborhood(b, query).expect("in-bounds neighbor");
            assert!(
                back.contains(&a),
                "neighborhood symmetry violated: {b:?} in N({a:?}) but {a:?} not in N({b:?})"
            );
        }
    }
}

/// Neighborhoods never repeat a cell.
pub fn assert_neighborhood_unique<S: DiscreteSpace>(space: &S, query: &S::Query) {
    for a in space.cells() {
        let n = space.neighborhood(a, query).expect("in-bounds cell");
        let unique: IndexSet<String> = n.iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(unique.len(), n.len(), "duplicate cells in N({a:?})");
    }
}

/// `remove(a); remove(a)` equals `remove(a)`.
pub fn assert_remove_idempotent<S: DiscreteSpace>(mut space: S) {
    let cell = space.cells()[0];
    let agent = AgentId(1);
    space.place(agent, cell).expect("empty space accepts placement");
    assert!(space.remove(agent));
    assert!(!space.remove(agent));
    assert!(!space.contains(agent));
    assert_eq!(space.agent_count(), 0);
    assert!(space.is_empty(cell).expect("in-bounds cell"));
}

/// `place(a, p); move(a, p)` leaves state unchanged.
pub fn assert_move_to_same_cell_is_noop<S: DiscreteSpace>(mut space: S) {
    let cell = space.cells()[0];
    let agent = AgentId(7);
    space.place(agent, cell).expect("empty space accepts placement");
    let before = space.contents(cell).expect("in-bounds cell");
    space.move_agent(agent, cell).expect("same-cell move succeeds");
    assert_eq!(space.contents(cell).expect("in-bounds cell"), before);
    assert_eq!(space.position(agent), Some(cell));
}

/// Filling every cell via `random_empty_cell` eventually yields `None`
/// and the empty set tracks occupancy throughout.
pub fn assert_fill_exhausts_empties<S: DiscreteSpace>(mut space: S) {
    let mut rng = RandomSource::new(17);
    let total = space.cell_count();
    for i in 0..total {
        assert_eq!(space.empty_cells().len(), total - i);
        let cell = space
            .random_empty_cell(&mut rng)
            .expect("empty cell available");
        assert!(space.is_empty(cell).expect("in-bounds cell"));
        space
            .place(AgentId(i as u64), cell)
            .expect("empty cell accepts agent");
    }
    assert!(space.empty_cells().is_empty());
    assert_eq!(space.random_empty_cell(&mut rng), None);
    assert_eq!(space.agent_count(), total);
}

/// `cells()` is deterministic and has `cell_count()` unique entries.
pub fn assert_cells_complete<S: DiscreteSpace>(space: &S) {
    let a = space.cells();
    assert_eq!(a, space.cells(), "cells() is non-deterministic");
    assert_eq!(a.len(), space.cell_count());
    let unique: IndexSet<String> = a.iter().map(|p| format!("{p:?}")).collect();
    assert_eq!(unique.len(), a.len(), "cells() has duplicates");
}

/// Run every check on fresh instances from `make`.
pub fn run_full_compliance<S: DiscreteSpace>(make: impl Fn() -> S, query: &S::Query) {
    let space = make();
    assert_cells_complete(&space);
    assert_neighborhood_symmetric(&space, query);
    assert_neighborhood_unique(&space, query);
    assert_remove_idempotent(make());
    assert_move_to_same_cell_is_noop(make());
    assert_fill_exhausts_empties(make());
}
