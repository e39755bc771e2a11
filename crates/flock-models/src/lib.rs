//! Reference models for the Flock runtime.
//!
//! Each module is a complete model: agent type, environment, parameter
//! defaults and a `build(params, seed)` factory with the signature the
//! batch runner expects. [`catalog`] exposes them by name for the CLI.
//!
//! | Name | Space | Activation |
//! |---|---|---|
//! | `wealth` | multi-occupancy torus grid | random |
//! | `segregation` | single-occupancy torus grid | random |
//! | `wolf_sheep` | multi-occupancy torus grid + grass layers | random by type |
//! | `conway` | single-occupancy torus grid | simultaneous |
//! | `virus` | Erdős–Rényi network | random |
//! | `bank_reserves` | multi-occupancy torus grid | random |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bank_reserves;
pub mod catalog;
pub mod conway;
pub mod segregation;
pub mod virus;
pub mod wealth;
pub mod wolf_sheep;

pub use catalog::{catalog, find, RunOutput, Scenario, SweepOptions};

use flock_core::{ConfigError, ParamSet};
use flock_engine::AgentError;
use flock_space::SpaceError;

/// Grid dimension parameter: a positive integer that fits in `u32`.
pub(crate) fn dim(params: &ParamSet, name: &str, default: u32) -> Result<u32, ConfigError> {
    let v = params.usize_or(name, default as usize)?;
    match u32::try_from(v) {
        Ok(d) if d > 0 => Ok(d),
        _ => Err(ConfigError::invalid(name, format!("must be in 1..={}, got {v}", u32::MAX))),
    }
}

/// Space construction failures are configuration problems.
pub(crate) fn space_config(e: SpaceError) -> ConfigError {
    match e {
        SpaceError::Config(c) => c,
        other => ConfigError::InvalidSpace {
            reason: other.to_string(),
        },
    }
}

/// Population setup failures (no room left, bad placement) are
/// configuration problems too.
pub(crate) fn setup_config(e: AgentError) -> ConfigError {
    match e {
        AgentError::Config(c) => c,
        AgentError::Space(s) => space_config(s),
        other => ConfigError::InvalidSpace {
            reason: other.to_string(),
        },
    }
}
