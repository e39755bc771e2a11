//! What an agent can reach during its activation.

use flock_core::{AgentId, RandomSource, Record, TickId};

use crate::agent::{Agent, Environment};
use crate::error::AgentError;
use crate::registry::AgentRegistry;

// ── World ───────────────────────────────────────────────────────

/// Buffered event-table row, flushed to the collector at the tick boundary.
#[derive(Clone, Debug)]
pub(crate) struct EventRow {
    pub(crate) table: String,
    pub(crate) agent: Option<AgentId>,
    pub(crate) record: Record,
}

/// The mutable state a tick operates on.
///
/// Kept apart from the scheduler and collector so an activation can
/// borrow the whole world while the scheduler iterates its plan.
pub(crate) struct World<A: Agent> {
    pub(crate) tick: TickId,
    pub(crate) registry: AgentRegistry<A>,
    pub(crate) env: A::Env,
    pub(crate) rng: RandomSource,
    pub(crate) events: Vec<EventRow>,
    pub(crate) in_tick: bool,
}

impl<A: Agent> World<A> {
    pub(crate) fn new(env: A::Env, rng: RandomSource) -> Self {
        Self {
            tick: TickId::default(),
            registry: AgentRegistry::new(),
            env,
            rng,
            events: Vec::new(),
            in_tick: false,
        }
    }

    pub(crate) fn create_with<F>(&mut self, agent: A, init: F) -> Result<AgentId, AgentError>
    where
        F: FnOnce(AgentId, &mut A::Env, &mut RandomSource) -> Result<(), AgentError>,
    {
        let id = self.registry.reserve();
        if let Err(e) = init(id, &mut self.env, &mut self.rng) {
            self.env.visit_spaces(&mut |s| {
                s.remove(id);
            });
            return Err(e);
        }
        self.registry.insert(id, agent);
        Ok(id)
    }

    /// Remove an agent: tombstone in the registry, then drop it from
    /// every space. Slot release waits for the tick boundary.
    pub(crate) fn remove(&mut self, id: AgentId) -> bool {
        if !self.registry.mark_removed(id) {
            return false;
        }
        self.env.visit_spaces(&mut |s| {
            s.remove(id);
        });
        true
    }

    pub(crate) fn begin_tick(&mut self) {
        self.in_tick = true;
        self.registry.set_deferring(true);
        self.env.visit_spaces(&mut |s| s.begin_tick());
    }

    pub(crate) fn end_tick(&mut self) -> (Vec<AgentId>, Vec<AgentId>) {
        let flushed = self.registry.flush();
        self.registry.set_deferring(false);
        self.env.visit_spaces(&mut |s| s.end_tick());
        self.in_tick = false;
        flushed
    }
}

// ── AgentContext ────────────────────────────────────────────────

/// Simultaneous borrows of the registry, environment and random stream.
pub struct Parts<'a, A: Agent> {
    /// Every other agent.
    pub agents: &'a mut AgentRegistry<A>,
    /// The environment.
    pub env: &'a mut A::Env,
    /// The model's random stream.
    pub rng: &'a mut RandomSource,
}

/// Handle given to [`Agent::step`] and [`Agent::commit`].
///
/// The acting agent itself is lent out for the call, so it does not show
/// up in [`agents`](Self::agents) lookups or iteration.
pub struct AgentContext<'a, A: Agent> {
    id: AgentId,
    world: &'a mut World<A>,
}

impl<'a, A: Agent> AgentContext<'a, A> {
    pub(crate) fn new(id: AgentId, world: &'a mut World<A>) -> Self {
        Self { id, world }
    }

    /// Id of the acting agent.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Current tick.
    pub fn tick(&self) -> TickId {
        self.world.tick
    }

    /// Read access to the other agents.
    pub fn agents(&self) -> &AgentRegistry<A> {
        &self.world.registry
    }

    /// Write access to the other agents.
    pub fn agents_mut(&mut self) -> &mut AgentRegistry<A> {
        &mut self.world.registry
    }

    /// Another active agent.
    pub fn agent(&self, id: AgentId) -> Option<&A> {
        self.world.registry.get(id)
    }

    /// Another active agent, mutably.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut A> {
        self.world.registry.get_mut(id)
    }

    /// The environment.
    pub fn env(&self) -> &A::Env {
        &self.world.env
    }

    /// The environment, mutably.
    pub fn env_mut(&mut self) -> &mut A::Env {
        &mut self.world.env
    }

    /// The model's random stream.
    pub fn rng(&mut self) -> &mut RandomSource {
        &mut self.world.rng
    }

    /// Borrow registry, environment and random stream together.
    pub fn parts(&mut self) -> Parts<'_, A> {
        Parts {
            agents: &mut self.world.registry,
            env: &mut self.world.env,
            rng: &mut self.world.rng,
        }
    }

    /// Create an agent. It becomes active at the next tick boundary.
    pub fn create(&mut self, agent: A) -> AgentId {
        let id = self.world.registry.reserve();
        self.world.registry.insert(id, agent);
        id
    }

    /// Create an agent and run `init` with its id, typically to place it.
    ///
    /// On failure the id is consumed and any partial placement undone.
    pub fn create_with<F>(&mut self, agent: A, init: F) -> Result<AgentId, AgentError>
    where
        F: FnOnce(AgentId, &mut A::Env, &mut RandomSource) -> Result<(), AgentError>,
    {
        self.world.create_with(agent, init)
    }

    /// Remove an agent. Space membership is dropped at once; the agent
    /// is skipped for the rest of the tick. Returns `false` if it was
    /// already gone.
    ///
    /// Removal is visible immediately rather than at the tick boundary:
    /// agents activating later in the same tick no longer find the
    /// removed agent through lookups, iteration or space queries. Only
    /// the slot release and the scheduler update wait for the boundary.
    pub fn remove(&mut self, id: AgentId) -> bool {
        self.world.remove(id)
    }

    /// Remove the acting agent.
    pub fn remove_self(&mut self) -> bool {
        let id = self.id;
        self.world.remove(id)
    }

    /// Whether the acting agent has been removed during this activation.
    pub fn is_removed(&self) -> bool {
        self.world.registry.status(self.id) == crate::registry::AgentStatus::Removed
    }

    /// Append a row to a declared event table. The row is stamped with
    /// the tick and the acting agent's id, and is written only if the
    /// tick completes.
    pub fn record(&mut self, table: &str, record: Record) {
        self.world.events.push(EventRow {
            table: table.to_owned(),
            agent: Some(self.id),
            record,
        });
    }
}

// ── StageContext ────────────────────────────────────────────────

/// Read-only handle given to [`Agent::stage`].
pub struct StageContext<'a, A: Agent> {
    pub(crate) id: AgentId,
    pub(crate) tick: TickId,
    pub(crate) agents: &'a AgentRegistry<A>,
    pub(crate) env: &'a A::Env,
    pub(crate) rng: &'a mut RandomSource,
}

impl<'a, A: Agent> StageContext<'a, A> {
    /// Id of the acting agent.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Current tick.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// The other agents, as of the start of the tick.
    pub fn agents(&self) -> &AgentRegistry<A> {
        self.agents
    }

    /// Another active agent.
    pub fn agent(&self, id: AgentId) -> Option<&A> {
        self.agents.get(id)
    }

    /// The environment, as of the start of the tick.
    pub fn env(&self) -> &A::Env {
        self.env
    }

    /// The model's random stream.
    pub fn rng(&mut self) -> &mut RandomSource {
        self.rng
    }
}
