//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flock_core::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "flock",
    version,
    about = "Run and sweep the Flock reference agent-based models"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the available models and their default parameters.
    List,
    /// Run one model to termination or the step cap.
    Run(RunArgs),
    /// Sweep a parameter grid with repetitions.
    Batch(BatchArgs),
}

/// Options shared by `run` and `batch`.
#[derive(Args, Debug)]
pub struct Common {
    /// Catalog name of the model (see `flock list`).
    pub model: String,

    /// Seed for `run`, master seed for `batch`. Drawn at random if unset.
    #[arg(long, env = "MODEL_SEED")]
    pub seed: Option<u64>,

    /// Maximum number of steps per run.
    #[arg(long, default_value_t = 100)]
    pub steps: u64,

    /// Parameter override as name=value; repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Output encoding.
    #[arg(long, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Output file; stdout if omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: Common,

    /// Also write the per-agent table to this file.
    #[arg(long)]
    pub agents: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub common: Common,

    /// JSON object of `name: value` (fixed) or `name: [values]` (swept).
    #[arg(long = "params", value_name = "FILE")]
    pub grid: Option<PathBuf>,

    /// Repetitions per parameter combination.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub reps: u64,

    /// Worker threads; automatic if unset.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Emit every collected tick that is a multiple of N instead of only
    /// the final state.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub every: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "flock", "run", "wealth", "--seed", "42", "--steps", "10", "--param", "n=50",
            "--param", "width=5", "--format", "jsonl",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.common.model, "wealth");
        assert_eq!(args.common.seed, Some(42));
        assert_eq!(args.common.steps, 10);
        assert_eq!(args.common.params, ["n=50", "width=5"]);
        assert_eq!(args.common.format, OutputFormat::Jsonl);
        assert!(args.agents.is_none());
    }

    #[test]
    fn batch_rejects_zero_reps() {
        assert!(Cli::try_parse_from(["flock", "batch", "wealth", "--reps", "0"]).is_err());
        let cli = Cli::try_parse_from(["flock", "batch", "wealth", "--reps", "5", "--workers", "2"])
            .unwrap();
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(args.reps, 5);
        assert_eq!(args.workers, Some(2));
        assert!(args.grid.is_none());
    }

    #[test]
    fn unknown_format_is_a_usage_error() {
        assert!(Cli::try_parse_from(["flock", "run", "wealth", "--format", "parquet"]).is_err());
    }
}
