//! SIR epidemic on an Erdős–Rényi contact network.
//!
//! Each tick every infected host contacts `contacts` random neighbors
//! (every neighbor when `contacts` is 0) and infects a susceptible one
//! with probability `infection_p`. Hosts
//! recover after `recovery_ticks` ticks of infection and stay immune.
//! The model stops once nobody is infected.

use flock_core::{AgentId, ConfigError, NodeId, ParamSet, Value};
use flock_engine::{Activation, Agent, AgentContext, AgentError, DataCollector, Model};
use flock_space::{Network, NetworkQuery, Space, SpaceError};

use crate::{setup_config, space_config};

/// Catalog name.
pub const NAME: &str = "virus";

/// Compartment of a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Health {
    /// Can be infected.
    Susceptible,
    /// Spreading.
    Infected,
    /// Immune.
    Recovered,
}

impl Health {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Susceptible => "susceptible",
            Self::Infected => "infected",
            Self::Recovered => "recovered",
        }
    }
}

/// Which neighbors an infected host meets in one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contacts {
    /// This many neighbors drawn with replacement.
    Sampled(usize),
    /// Each neighbor once.
    Every,
}

impl Contacts {
    /// `0` means every neighbor.
    pub fn from_count(n: usize) -> Self {
        match n {
            0 => Self::Every,
            k => Self::Sampled(k),
        }
    }
}

/// Per-model transmission settings, carried by every host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disease {
    /// Infection probability per contact.
    pub infection_p: f64,
    /// Contacts an infected host makes per tick.
    pub contacts: Contacts,
    /// Ticks until recovery.
    pub recovery_ticks: u32,
}

/// A host sitting on one network node.
#[derive(Clone, Debug, PartialEq)]
pub struct Host {
    /// Current compartment.
    pub health: Health,
    /// Ticks spent infected so far.
    pub infected_for: u32,
    disease: Disease,
}

impl Host {
    /// A susceptible host.
    pub fn new(disease: Disease) -> Self {
        Self {
            health: Health::Susceptible,
            infected_for: 0,
            disease,
        }
    }

    fn infect(&mut self) {
        self.health = Health::Infected;
        self.infected_for = 0;
    }
}

impl Agent for Host {
    type Env = Network;

    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        if self.health != Health::Infected {
            return Ok(());
        }
        let id = ctx.id();
        let here = ctx.env().position(id).ok_or(SpaceError::NotPlaced { agent: id })?;
        let neighbors = ctx.env().neighbors(here, &NetworkQuery::hops(1))?;
        let p = self.disease.infection_p;
        match self.disease.contacts {
            Contacts::Every => {
                for &other in &neighbors {
                    expose(ctx, other, p);
                }
            }
            Contacts::Sampled(k) => {
                for _ in 0..k {
                    let Some(&other) = ctx.rng().choose(&neighbors) else {
                        break;
                    };
                    expose(ctx, other, p);
                }
            }
        }
        self.infected_for += 1;
        if self.infected_for >= self.disease.recovery_ticks {
            self.health = Health::Recovered;
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        (name == "health").then(|| self.health.as_str().into())
    }
}

/// One contact: a transmission draw, applied if `other` is susceptible.
fn expose(ctx: &mut AgentContext<'_, Host>, other: AgentId, p: f64) {
    let transmit = ctx.rng().bernoulli(p);
    if let Some(host) = ctx.agent_mut(other) {
        if transmit && host.health == Health::Susceptible {
            host.infect();
        }
    }
}

/// Default parameters.
pub fn defaults() -> ParamSet {
    ParamSet::new()
        .with("nodes", 100i64)
        .with("edge_p", 0.1)
        .with("initial_infected", 1i64)
        .with("infection_p", 0.4)
        .with("contacts", 1i64)
        .with("recovery_ticks", 5i64)
}

/// Number of hosts in `health`.
pub fn count(model: &Model<Host>, health: Health) -> usize {
    model.agents().count_where(|h| h.health == health)
}

/// Build a seeded epidemic.
///
/// The graph is drawn from the model's own random stream, one host is
/// placed per node, and `initial_infected` distinct hosts start infected.
pub fn build(params: &ParamSet, seed: u64) -> Result<Model<Host>, ConfigError> {
    let nodes = params.usize_or("nodes", 100)?;
    let nodes = u32::try_from(nodes).map_err(|_| ConfigError::invalid("nodes", "too many nodes"))?;
    let edge_p = params.probability_or("edge_p", 0.1)?;
    let initial = params.usize_or("initial_infected", 1)?;
    if initial > nodes as usize {
        return Err(ConfigError::invalid(
            "initial_infected",
            format!("cannot exceed {nodes} nodes"),
        ));
    }
    let recovery = params.usize_or("recovery_ticks", 5)?;
    let disease = Disease {
        infection_p: params.probability_or("infection_p", 0.4)?,
        contacts: Contacts::from_count(params.usize_or("contacts", 1)?),
        recovery_ticks: u32::try_from(recovery)
            .ok()
            .filter(|&r| r >= 1)
            .ok_or_else(|| ConfigError::invalid("recovery_ticks", "must be in 1..=u32::MAX"))?,
    };

    let collector = DataCollector::builder()
        .model("susceptible", |m: &Model<Host>| count(m, Health::Susceptible).into())
        .model("infected", |m: &Model<Host>| count(m, Health::Infected).into())
        .model("recovered", |m: &Model<Host>| count(m, Health::Recovered).into())
        .attribute("health")
        .build()?;

    // Placeholder network; replaced below once the seeded stream exists.
    let mut model = Model::builder(Network::new(0))
        .seed(seed)
        .params(params.clone())
        .activation(Activation::Random)
        .collector(collector)
        .after_step(|m: &mut Model<Host>| {
            if count(m, Health::Infected) == 0 {
                m.stop();
            }
            Ok(())
        })
        .build()?;
    let graph = Network::erdos_renyi(nodes, edge_p, model.rng()).map_err(space_config)?;
    *model.env_mut() = graph;

    let mut hosts = Vec::with_capacity(nodes as usize);
    for n in 0..nodes {
        let id = model
            .create_with(Host::new(disease), |id, net, _| {
                net.place(id, NodeId(n))?;
                Ok(())
            })
            .map_err(setup_config)?;
        hosts.push(id);
    }
    for id in model.rng().sample(&hosts, initial) {
        if let Some(h) = model.agent_mut(id) {
            h.infect();
        }
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_hosts_never_spread() {
        let params = ParamSet::new()
            .with("nodes", 20i64)
            .with("edge_p", 0.0)
            .with("initial_infected", 3i64);
        let mut m = build(&params, 4).unwrap();
        m.run_for(50).unwrap();
        assert!(!m.running());
        assert_eq!(count(&m, Health::Recovered), 3);
        assert_eq!(count(&m, Health::Susceptible), 17);
    }

    #[test]
    fn zero_contacts_meets_every_neighbor() {
        let params = ParamSet::new()
            .with("nodes", 10i64)
            .with("edge_p", 1.0)
            .with("infection_p", 1.0)
            .with("contacts", 0i64);
        let mut m = build(&params, 6).unwrap();
        m.step().unwrap();
        assert_eq!(count(&m, Health::Susceptible), 0);
        assert_eq!(Contacts::from_count(3), Contacts::Sampled(3));
    }

    #[test]
    fn compartments_partition_the_population() {
        let mut m = build(&defaults(), 11).unwrap();
        for _ in 0..10 {
            m.step().unwrap();
            let total = count(&m, Health::Susceptible)
                + count(&m, Health::Infected)
                + count(&m, Health::Recovered);
            assert_eq!(total, 100);
        }
    }

    #[test]
    fn too_many_initial_infections_rejected() {
        let params = ParamSet::new().with("nodes", 5i64).with("initial_infected", 6i64);
        assert!(build(&params, 0).is_err());
    }
}
