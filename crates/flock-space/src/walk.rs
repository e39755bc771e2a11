//! Movement helpers over any discrete space.
//!
//! Common agent behaviors (random walks, relocating to free cells) are
//! plain functions over a space and the model's random source, so any
//! agent type can use them.

use flock_core::{AgentId, RandomSource};

use crate::error::SpaceError;
use crate::space::DiscreteSpace;

/// Move `agent` to a uniformly chosen neighboring cell with room.
///
/// Returns the new position, or `None` (agent unmoved) when no cell in
/// the neighborhood can take it.
///
/// # Errors
///
/// `NotPlaced` if the agent has no position.
pub fn random_move<S: DiscreteSpace>(
    space: &mut S,
    agent: AgentId,
    query: &S::Query,
    rng: &mut RandomSource,
) -> Result<Option<S::Pos>, SpaceError> {
    let here = space.position(agent).ok_or(SpaceError::NotPlaced { agent })?;
    let mut open = Vec::new();
    for cell in space.neighborhood(here, query)? {
        if cell == here || space.has_room(cell)? {
            open.push(cell);
        }
    }
    match rng.choose(&open).copied() {
        Some(to) => {
            space.move_agent(agent, to)?;
            Ok(Some(to))
        }
        None => Ok(None),
    }
}

/// Move `agent` to a uniformly chosen empty cell anywhere in the space.
///
/// Returns the new position, or `None` when no cell is empty.
///
/// # Errors
///
/// `NotPlaced` if the agent has no position.
pub fn move_to_random_empty<S: DiscreteSpace>(
    space: &mut S,
    agent: AgentId,
    rng: &mut RandomSource,
) -> Result<Option<S::Pos>, SpaceError> {
    if !space.contains(agent) {
        return Err(SpaceError::NotPlaced { agent });
    }
    match space.random_empty_cell(rng) {
        Some(to) => {
            space.move_agent(agent, to)?;
            Ok(Some(to))
        }
        None => Ok(None),
    }
}

/// Place an unplaced agent on a uniformly chosen empty cell.
///
/// # Errors
///
/// `CellOccupied` when the space has no empty cell, `AlreadyPlaced` if
/// the agent already has a position.
pub fn place_at_random_empty<S: DiscreteSpace>(
    space: &mut S,
    agent: AgentId,
    rng: &mut RandomSource,
) -> Result<S::Pos, SpaceError> {
    let to = space
        .random_empty_cell(rng)
        .ok_or_else(|| SpaceError::CellOccupied {
            pos: "any".to_string(),
        })?;
    space.place(agent, to)?;
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GridQuery, OrthogonalGrid, Space};

    #[test]
    fn random_move_stays_adjacent() {
        let mut g = OrthogonalGrid::new(5, 5, true).unwrap();
        let mut rng = RandomSource::new(3);
        g.place(AgentId(1), (2, 2)).unwrap();
        for _ in 0..50 {
            let before = g.position(AgentId(1)).unwrap();
            let after = random_move(&mut g, AgentId(1), &GridQuery::moore(1), &mut rng)
                .unwrap()
                .unwrap();
            let n = g.neighborhood(before, &GridQuery::moore(1)).unwrap();
            assert!(n.contains(&after));
        }
    }

    #[test]
    fn random_move_boxed_in_returns_none() {
        let mut g = OrthogonalGrid::new(2, 1, false).unwrap();
        let mut rng = RandomSource::new(0);
        g.place(AgentId(1), (0, 0)).unwrap();
        g.place(AgentId(2), (1, 0)).unwrap();
        assert_eq!(
            random_move(&mut g, AgentId(1), &GridQuery::moore(1), &mut rng).unwrap(),
            None
        );
        assert_eq!(g.position(AgentId(1)), Some((0, 0)));
    }

    #[test]
    fn move_to_empty_and_place() {
        let mut g = OrthogonalGrid::new(3, 1, false).unwrap();
        let mut rng = RandomSource::new(1);
        let p = place_at_random_empty(&mut g, AgentId(1), &mut rng).unwrap();
        assert_eq!(g.position(AgentId(1)), Some(p));
        let q = move_to_random_empty(&mut g, AgentId(1), &mut rng).unwrap().unwrap();
        assert_ne!(p, q);
        place_at_random_empty(&mut g, AgentId(2), &mut rng).unwrap();
        place_at_random_empty(&mut g, AgentId(3), &mut rng).unwrap();
        assert!(place_at_random_empty(&mut g, AgentId(4), &mut rng).is_err());
        assert_eq!(move_to_random_empty(&mut g, AgentId(1), &mut rng).unwrap(), None);
        assert!(move_to_random_empty(&mut g, AgentId(9), &mut rng).is_err());
    }
}
