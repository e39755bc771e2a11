//! Mapping failures to exit codes and the one-line stderr report.

use std::process::ExitCode;

use flock_core::{AgentId, ConfigError, ErrorKind, TickId};
use flock_engine::{BatchError, ModelError};
use serde_json::json;

/// Exit status for a parameter or configuration problem.
pub const EXIT_CONFIG: u8 = 2;
/// Exit status for a failure while running.
pub const EXIT_RUNTIME: u8 = 3;

/// What the CLI reports about a failed command.
#[derive(Debug, PartialEq)]
pub struct Failure {
    pub kind: &'static str,
    pub tick: Option<TickId>,
    pub agent: Option<AgentId>,
    pub message: String,
}

impl Failure {
    /// Classify an error by the library error at the root of its chain.
    /// Anything else (files, encoding) is reported as `io`.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let (kind, tick, agent) = if let Some(e) = err.downcast_ref::<ModelError>() {
            (e.kind().as_str(), e.tick(), e.agent())
        } else if let Some(e) = err.downcast_ref::<BatchError>() {
            match e {
                BatchError::Run { source, .. } => (e.kind().as_str(), source.tick(), source.agent()),
                _ => (e.kind().as_str(), None, None),
            }
        } else if let Some(e) = err.downcast_ref::<ConfigError>() {
            (e.kind().as_str(), None, None)
        } else {
            ("io", None, None)
        };
        Self {
            kind,
            tick,
            agent,
            message,
        }
    }

    /// `2` for configuration problems, `3` for everything else.
    pub fn exit_code(&self) -> u8 {
        if self.kind == ErrorKind::Config.as_str() {
            EXIT_CONFIG
        } else {
            EXIT_RUNTIME
        }
    }

    /// Single-line JSON object.
    pub fn to_json(&self) -> String {
        json!({
            "kind": self.kind,
            "tick": self.tick.map(|t| t.0),
            "agent": self.agent.map(|a| a.0),
            "message": self.message,
        })
        .to_string()
    }

    /// Print the report on stderr and produce the exit status.
    pub fn report(&self) -> ExitCode {
        eprintln!("{}", self.to_json());
        ExitCode::from(self.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use flock_engine::AgentError;

    #[test]
    fn config_errors_exit_two() {
        let err = anyhow::Error::new(ConfigError::invalid("density", "must be in [0, 1]"));
        let f = Failure::from_error(&err);
        assert_eq!(f.kind, "config");
        assert_eq!(f.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn step_failure_carries_tick_and_agent() {
        let err: anyhow::Result<()> = Err(ModelError::StepFailure {
            agent: AgentId(4),
            tick: TickId(12),
            source: AgentError::failed("boom"),
        })
        .context("running wealth");
        let f = Failure::from_error(&err.unwrap_err());
        assert_eq!(f.kind, "step_failure");
        assert_eq!(f.tick, Some(TickId(12)));
        assert_eq!(f.agent, Some(AgentId(4)));
        assert_eq!(f.exit_code(), EXIT_RUNTIME);
        assert!(f.message.starts_with("running wealth: "));

        let line: serde_json::Value = serde_json::from_str(&f.to_json()).unwrap();
        assert_eq!(line["tick"], 12);
        assert_eq!(line["agent"], 4);
        assert_eq!(line["kind"], "step_failure");
    }

    #[test]
    fn batch_build_failure_is_config() {
        let err = anyhow::Error::new(BatchError::Build {
            run: 3,
            source: ConfigError::Unseeded,
        });
        let f = Failure::from_error(&err);
        assert_eq!(f.exit_code(), EXIT_CONFIG);
        assert_eq!(f.tick, None);
    }

    #[test]
    fn io_errors_are_runtime() {
        let err = anyhow::Error::new(std::io::Error::other("disk full"));
        let f = Failure::from_error(&err);
        assert_eq!(f.kind, "io");
        assert_eq!(f.exit_code(), EXIT_RUNTIME);
        assert!(f.to_json().contains("\"agent\":null"));
    }
}
