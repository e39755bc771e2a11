//! The traits model code implements: [`Agent`] and [`Environment`].

use flock_core::Value;
use flock_space::{Continuous2D, HexGrid, Membership, Network, OrthogonalGrid};

use crate::context::{AgentContext, StageContext};
use crate::error::AgentError;

/// One autonomous entity of a model.
///
/// A model holds a single agent type `A`. Models with several kinds of
/// agent use an enum and report each variant through
/// [`type_tag`](Agent::type_tag), which drives by-type activation and
/// by-type registry queries.
///
/// During its activation an agent has exclusive `&mut self` access to its
/// own state and reaches everything else (other agents, the environment,
/// the random stream) through the context.
pub trait Agent: Sized + 'static {
    /// World state shared by all agents: spaces, layers, globals.
    type Env: Environment;

    /// Type tag for by-type scheduling and queries.
    fn type_tag(&self) -> &'static str {
        "agent"
    }

    /// Activation under sequential, random and by-type policies.
    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError>;

    /// First pass of simultaneous activation.
    ///
    /// Compute the next state from a read-only view of the world and
    /// keep it in the agent itself. Stage must not read other agents'
    /// staged fields.
    fn stage(&mut self, ctx: &mut StageContext<'_, Self>) -> Result<(), AgentError> {
        let _ = ctx;
        Ok(())
    }

    /// Second pass of simultaneous activation: publish the staged state.
    fn commit(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        let _ = ctx;
        Ok(())
    }

    /// Named attribute lookup used by attribute-style agent reporters.
    fn attribute(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }
}

/// The world an agent population lives in.
///
/// The harness needs to reach every space the environment owns: to drop
/// an agent's membership when it is removed, and to freeze topology for
/// the duration of a tick.
pub trait Environment: 'static {
    /// Call `f` once for every space owned by this environment.
    fn visit_spaces(&mut self, f: &mut dyn FnMut(&mut dyn Membership));
}

impl Environment for () {
    fn visit_spaces(&mut self, _f: &mut dyn FnMut(&mut dyn Membership)) {}
}

macro_rules! space_environment {
    ($($ty:ty),*) => {
        $(
            impl Environment for $ty {
                fn visit_spaces(&mut self, f: &mut dyn FnMut(&mut dyn Membership)) {
                    f(self);
                }
            }
        )*
    };
}

space_environment!(OrthogonalGrid, HexGrid, Network, Continuous2D);
