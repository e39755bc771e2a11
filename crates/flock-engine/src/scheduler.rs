//! Activation policies and the per-tick activation pass.
//!
//! The scheduler owns the ordered member set and decides, once per tick,
//! which agents activate and in what order. Membership changes requested
//! while a tick is running are queued and applied at the boundary, so
//! the plan computed at the start of a tick never changes underneath it.
//! An agent removed mid-tick is still in the plan but is skipped when
//! its turn comes.

use std::fmt;

use flock_core::{AgentId, RandomSource};
use indexmap::IndexSet;
use tracing::warn;

use crate::agent::Agent;
use crate::context::{AgentContext, StageContext, World};
use crate::error::{AgentError, ModelError};
use crate::registry::AgentRegistry;

/// Order in which agents activate within a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Activation {
    /// Insertion order.
    Sequential,
    /// A fresh random permutation every tick.
    #[default]
    Random,
    /// Two passes: every agent stages from the same snapshot, then
    /// every agent commits.
    Simultaneous,
    /// Grouped by type tag in first-registration order, insertion order
    /// within each group.
    ByType,
    /// Grouped by type tag, shuffled within each group. With
    /// `shuffle_types` the group order is also shuffled each tick.
    RandomByType {
        /// Shuffle the order of the type groups as well.
        shuffle_types: bool,
    },
}

/// What to do when an agent's activation returns an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepRecovery {
    /// Abort the tick and return the error from `step()`.
    #[default]
    AbortTick,
    /// Log and carry on with the next agent.
    SkipAgent,
    /// Log, remove the failing agent, carry on.
    RemoveAgent,
}

type Filter<A> = Box<dyn Fn(AgentId, &A) -> bool>;

/// Decides the activation order of a tick and runs the activation pass.
pub struct Scheduler<A: Agent> {
    activation: Activation,
    recovery: StepRecovery,
    filter: Option<Filter<A>>,
    members: IndexSet<AgentId>,
    in_tick: bool,
    /// Membership requests made during a tick: `true` adds, `false` removes.
    queued: Vec<(AgentId, bool)>,
}

impl<A: Agent> fmt::Debug for Scheduler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("activation", &self.activation)
            .field("recovery", &self.recovery)
            .field("filtered", &self.filter.is_some())
            .field("members", &self.members.len())
            .finish()
    }
}

impl<A: Agent> Scheduler<A> {
    /// Scheduler with the given policy and no members.
    pub fn new(activation: Activation) -> Self {
        Self {
            activation,
            recovery: StepRecovery::default(),
            filter: None,
            members: IndexSet::new(),
            in_tick: false,
            queued: Vec::new(),
        }
    }

    /// Replace the activation policy.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Set the failure policy.
    pub fn with_recovery(mut self, recovery: StepRecovery) -> Self {
        self.recovery = recovery;
        self
    }

    /// Only activate agents satisfying `filter`, evaluated at plan time.
    pub fn with_filter(mut self, filter: impl Fn(AgentId, &A) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Active policy.
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Failure policy.
    pub fn recovery(&self) -> StepRecovery {
        self.recovery
    }

    /// Number of scheduled agents.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no agent is scheduled.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `id` is scheduled.
    pub fn contains(&self, id: AgentId) -> bool {
        self.members.contains(&id)
    }

    /// Schedule an agent. Deferred to the tick boundary inside a tick.
    pub fn add(&mut self, id: AgentId) {
        if self.in_tick {
            self.queued.push((id, true));
        } else {
            self.members.insert(id);
        }
    }

    /// Unschedule an agent without removing it from the model. Deferred
    /// to the tick boundary inside a tick.
    pub fn remove(&mut self, id: AgentId) {
        if self.in_tick {
            self.queued.push((id, false));
        } else {
            self.members.shift_remove(&id);
        }
    }

    /// Activation order for one tick.
    ///
    /// Members that are not active in `agents` or fail the filter are
    /// left out. Random policies consume draws from `rng`.
    pub fn plan(&self, agents: &AgentRegistry<A>, rng: &mut RandomSource) -> Vec<AgentId> {
        let mut eligible: Vec<AgentId> = self
            .members
            .iter()
            .copied()
            .filter(|&id| match agents.get(id) {
                Some(a) => self.filter.as_ref().map_or(true, |f| f(id, a)),
                None => false,
            })
            .collect();

        match self.activation {
            Activation::Sequential | Activation::Simultaneous => eligible,
            Activation::Random => {
                rng.shuffle(&mut eligible);
                eligible
            }
            Activation::ByType => group_by_type(agents, &eligible, None),
            Activation::RandomByType { shuffle_types } => {
                group_by_type(agents, &eligible, Some((rng, shuffle_types)))
            }
        }
    }

    /// Run one activation pass over `world`.
    pub(crate) fn step(&mut self, world: &mut World<A>) -> Result<(), ModelError> {
        let plan = self.plan(&world.registry, &mut world.rng);
        if self.activation == Activation::Simultaneous {
            return self.step_simultaneous(world, &plan);
        }
        for &id in &plan {
            self.activate(world, id, |agent, ctx| agent.step(ctx))?;
        }
        Ok(())
    }

    /// Stage every planned agent against the tick's starting state, then
    /// commit. Agents whose stage fails under `RemoveAgent` are removed
    /// only after the whole stage pass.
    fn step_simultaneous(&mut self, world: &mut World<A>, plan: &[AgentId]) -> Result<(), ModelError> {
        let mut staged = Vec::with_capacity(plan.len());
        let mut failed = Vec::new();
        for &id in plan {
            let Some(mut agent) = world.registry.checkout(id) else {
                continue;
            };
            let result = {
                let mut ctx = StageContext {
                    id,
                    tick: world.tick,
                    agents: &world.registry,
                    env: &world.env,
                    rng: &mut world.rng,
                };
                agent.stage(&mut ctx)
            };
            world.registry.checkin(id, agent);
            match result {
                Ok(()) => staged.push(id),
                Err(source) => {
                    if self.on_failure(world, id, source)? {
                        failed.push(id);
                    }
                }
            }
        }
        for id in failed {
            world.remove(id);
        }
        for id in staged {
            self.activate(world, id, |agent, ctx| agent.commit(ctx))?;
        }
        Ok(())
    }

    fn activate<F>(&self, world: &mut World<A>, id: AgentId, f: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut A, &mut AgentContext<'_, A>) -> Result<(), AgentError>,
    {
        // Removed earlier this tick, or never activated: skip.
        let Some(mut agent) = world.registry.checkout(id) else {
            return Ok(());
        };
        let result = {
            let mut ctx = AgentContext::new(id, world);
            f(&mut agent, &mut ctx)
        };
        world.registry.checkin(id, agent);
        self.recover(world, id, result).map(|_| ())
    }

    /// Apply the failure policy. `Ok(true)` when the activation succeeded.
    fn recover(
        &self,
        world: &mut World<A>,
        id: AgentId,
        result: Result<(), AgentError>,
    ) -> Result<bool, ModelError> {
        let Err(source) = result else {
            return Ok(true);
        };
        if self.on_failure(world, id, source)? {
            world.remove(id);
        }
        Ok(false)
    }

    /// Log or escalate a failed activation. `Ok(true)` when the agent
    /// must be removed.
    fn on_failure(&self, world: &World<A>, id: AgentId, source: AgentError) -> Result<bool, ModelError> {
        match self.recovery {
            StepRecovery::AbortTick => Err(ModelError::StepFailure {
                agent: id,
                tick: world.tick,
                source,
            }),
            StepRecovery::SkipAgent => {
                warn!(agent = id.0, tick = world.tick.0, error = %source, "agent step failed; skipped");
                Ok(false)
            }
            StepRecovery::RemoveAgent => {
                warn!(agent = id.0, tick = world.tick.0, error = %source, "agent step failed; removed");
                Ok(true)
            }
        }
    }

    pub(crate) fn begin_tick(&mut self) {
        self.in_tick = true;
    }

    /// Apply queued requests in request order, then the registry's
    /// boundary changes. Released agents go last so nothing queued can
    /// resurrect them.
    pub(crate) fn end_tick(&mut self, activated: &[AgentId], released: &[AgentId]) {
        self.in_tick = false;
        for (id, add) in self.queued.drain(..) {
            if add {
                self.members.insert(id);
            } else {
                self.members.shift_remove(&id);
            }
        }
        self.members.extend(activated.iter().copied());
        for id in released {
            self.members.shift_remove(id);
        }
    }
}

fn group_by_type<A: Agent>(
    agents: &AgentRegistry<A>,
    eligible: &[AgentId],
    mut shuffle: Option<(&mut RandomSource, bool)>,
) -> Vec<AgentId> {
    let mut tags: Vec<&'static str> = agents.type_tags().collect();
    if let Some((rng, true)) = shuffle.as_mut() {
        rng.shuffle(&mut tags);
    }
    let mut out = Vec::with_capacity(eligible.len());
    for tag in tags {
        let mut group: Vec<AgentId> = eligible
            .iter()
            .copied()
            .filter(|&id| agents.tag_of(id) == Some(tag))
            .collect();
        if let Some((rng, _)) = shuffle.as_mut() {
            rng.shuffle(&mut group);
        }
        out.extend(group);
    }
    out
}
