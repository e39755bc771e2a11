//! Agent storage: identity, lookup, ordered iteration, tombstones.

use flock_core::AgentId;
use indexmap::{IndexMap, IndexSet};

use crate::agent::Agent;

/// Lifecycle state of an id as seen by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    /// Live and visible to lookups and iteration.
    Active,
    /// Created during the current tick; becomes active at the boundary.
    Pending,
    /// Removed. The id is a tombstone and is never reused.
    Removed,
    /// Never allocated by this registry.
    Unknown,
}

#[derive(Debug)]
struct Slot<A> {
    /// `None` while the agent is checked out for its own activation.
    agent: Option<A>,
    tag: &'static str,
    status: AgentStatus,
}

/// Owns every agent of a model.
///
/// Ids come from a monotonic counter and are never reused. Iteration is
/// in insertion order and only yields [`AgentStatus::Active`] agents:
/// agents created during a tick stay invisible until the tick boundary,
/// and a removed agent disappears from lookups immediately.
///
/// The agent currently being activated is lent out to its own step and
/// is not reachable through the registry until the step returns.
#[derive(Debug)]
pub struct AgentRegistry<A> {
    slots: IndexMap<AgentId, Slot<A>>,
    tags: IndexSet<&'static str>,
    next_id: u64,
    deferring: bool,
    pending: Vec<AgentId>,
    released: Vec<AgentId>,
}

impl<A> Default for AgentRegistry<A> {
    fn default() -> Self {
        Self {
            slots: IndexMap::new(),
            tags: IndexSet::new(),
            next_id: 0,
            deferring: false,
            pending: Vec::new(),
            released: Vec::new(),
        }
    }
}

impl<A: Agent> AgentRegistry<A> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle state of `id`.
    pub fn status(&self, id: AgentId) -> AgentStatus {
        match self.slots.get(&id) {
            Some(slot) => slot.status,
            None if id.0 < self.next_id => AgentStatus::Removed,
            None => AgentStatus::Unknown,
        }
    }

    /// An active agent by id.
    pub fn get(&self, id: AgentId) -> Option<&A> {
        self.slots
            .get(&id)
            .filter(|s| s.status == AgentStatus::Active)
            .and_then(|s| s.agent.as_ref())
    }

    /// A mutable active agent by id.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut A> {
        self.slots
            .get_mut(&id)
            .filter(|s| s.status == AgentStatus::Active)
            .and_then(|s| s.agent.as_mut())
    }

    /// Active agents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &A)> {
        self.slots.iter().filter_map(|(&id, s)| match (&s.agent, s.status) {
            (Some(a), AgentStatus::Active) => Some((id, a)),
            _ => None,
        })
    }

    /// Mutable active agents in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AgentId, &mut A)> {
        self.slots
            .iter_mut()
            .filter_map(|(&id, s)| match (&mut s.agent, s.status) {
                (Some(a), AgentStatus::Active) => Some((id, a)),
                _ => None,
            })
    }

    /// Ids of active agents in insertion order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Active agents with the given type tag, in insertion order.
    pub fn by_type<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = (AgentId, &'a A)> + 'a {
        self.iter().filter(move |(id, _)| self.slots[id].tag == tag)
    }

    /// Number of active agents.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Number of active agents with the given tag.
    pub fn count_type(&self, tag: &str) -> usize {
        self.by_type(tag).count()
    }

    /// Number of active agents satisfying `pred`.
    pub fn count_where(&self, mut pred: impl FnMut(&A) -> bool) -> usize {
        self.iter().filter(|(_, a)| pred(a)).count()
    }

    /// Every tag seen so far, in first-registration order.
    pub fn type_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tags.iter().copied()
    }

    /// Type tag recorded for `id` at insertion, if the slot is still held.
    pub fn tag_of(&self, id: AgentId) -> Option<&'static str> {
        self.slots.get(&id).map(|s| s.tag)
    }

    /// Whether no agent is active.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    // ── Crate-internal lifecycle ────────────────────────────────

    /// Allocate the next id without storing anything.
    pub(crate) fn reserve(&mut self) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Store an agent under a reserved id. Pending while deferring.
    pub(crate) fn insert(&mut self, id: AgentId, agent: A) {
        let tag = agent.type_tag();
        self.tags.insert(tag);
        let status = if self.deferring {
            self.pending.push(id);
            AgentStatus::Pending
        } else {
            AgentStatus::Active
        };
        self.slots.insert(
            id,
            Slot {
                agent: Some(agent),
                tag,
                status,
            },
        );
    }

    /// Mark `id` removed. Returns `false` if it was already removed or
    /// never existed. Outside a tick the slot is released at once.
    pub(crate) fn mark_removed(&mut self, id: AgentId) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        if slot.status == AgentStatus::Removed {
            return false;
        }
        slot.status = AgentStatus::Removed;
        if self.deferring {
            self.released.push(id);
        } else {
            self.slots.shift_remove(&id);
        }
        true
    }

    /// Take an active agent out for its own activation.
    pub(crate) fn checkout(&mut self, id: AgentId) -> Option<A> {
        self.slots
            .get_mut(&id)
            .filter(|s| s.status == AgentStatus::Active)
            .and_then(|s| s.agent.take())
    }

    /// Return a checked-out agent. Its status may have changed meanwhile.
    pub(crate) fn checkin(&mut self, id: AgentId, agent: A) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.agent = Some(agent);
        }
    }

    pub(crate) fn set_deferring(&mut self, deferring: bool) {
        self.deferring = deferring;
    }

    /// Apply deferred changes: pending agents become active, removed
    /// slots are dropped. Returns `(activated, released)` in request order.
    pub(crate) fn flush(&mut self) -> (Vec<AgentId>, Vec<AgentId>) {
        let mut activated = Vec::with_capacity(self.pending.len());
        for id in self.pending.drain(..) {
            if let Some(slot) = self.slots.get_mut(&id) {
                if slot.status == AgentStatus::Pending {
                    slot.status = AgentStatus::Active;
                    activated.push(id);
                }
            }
        }
        let released = std::mem::take(&mut self.released);
        if !released.is_empty() {
            self.slots.retain(|_, s| s.status != AgentStatus::Removed);
        }
        (activated, released)
    }
}
