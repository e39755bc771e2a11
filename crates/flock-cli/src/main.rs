//! `flock`: run and sweep the reference models from the command line.
//!
//! Tables go to stdout (or `--out`); logs and the failure line go to
//! stderr. Output files are encoded in memory and written in one piece,
//! so a failed run never leaves a partial table behind.
//!
//! Exit status: `0` on success, `2` for parameter and configuration
//! errors, `3` for failures while running or writing.

mod args;
mod failure;
mod output;

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use flock_core::{
    CancelToken, ConfigError, ParamSet, ParamSpec, ParameterGrid, RandomSource,
};
use flock_engine::Sampling;
use flock_models::{Scenario, SweepOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{BatchArgs, Cli, Command, Common, RunArgs};
use crate::failure::Failure;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MODEL_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Command::List => list(),
        Command::Run(args) => run(args),
        Command::Batch(args) => batch(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => Failure::from_error(&e).report(),
    }
}

fn list() -> Result<()> {
    let mut out = io::stdout().lock();
    for s in flock_models::catalog() {
        writeln!(out, "{:<14} {}", s.name(), s.description())?;
        let defaults: Vec<String> = s.defaults().iter().map(|(k, v)| format!("{k}={v}")).collect();
        writeln!(out, "{:<14} {}", "", defaults.join(" "))?;
    }
    Ok(())
}

/// Catalog defaults overlaid with `--param` assignments.
fn parameters(scenario: &dyn Scenario, assignments: &[String]) -> Result<ParamSet> {
    let mut params = scenario.defaults();
    for a in assignments {
        let (name, value) = ParamSet::parse_assignment(a)?;
        params.insert(name, value);
    }
    Ok(params)
}

/// The given seed, or a fresh one that is logged so the run can be
/// repeated.
fn resolve_seed(seed: Option<u64>) -> Result<u64> {
    match seed {
        Some(s) => Ok(s),
        None => {
            let s = RandomSource::from_option(None, false)?.seed();
            info!(seed = s, "no seed given; drew one");
            Ok(s)
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let Common {
        model,
        seed,
        steps,
        params,
        format,
        out,
    } = args.common;
    let scenario = flock_models::find(&model)?;
    let params = parameters(scenario.as_ref(), &params)?;
    let seed = resolve_seed(seed)?;

    let finished = scenario
        .run(&params, seed, steps, &CancelToken::new())
        .with_context(|| format!("running {model} with seed {seed}"))?;
    info!(model = %model, seed, ticks = finished.ticks, "run finished");

    let mut outputs = vec![output::encode(&finished.model, format, out.as_deref())?];
    if let Some(path) = args.agents.as_deref() {
        outputs.push(output::encode(&finished.agents, format, Some(path))?);
    }
    output::write_all(&outputs)
}

fn batch(args: BatchArgs) -> Result<()> {
    let Common {
        model,
        seed,
        steps,
        params,
        format,
        out,
    } = args.common;
    let scenario = flock_models::find(&model)?;

    let mut grid = match args.grid.as_deref() {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| {
                ConfigError::invalid("params", format!("cannot read {}: {e}", path.display()))
            })?;
            ParameterGrid::from_json(&text)?
        }
        None => ParameterGrid::new(),
    };
    for a in &params {
        let (name, value) = ParamSet::parse_assignment(a)?;
        grid.set(name, ParamSpec::Fixed(value));
    }

    let options = SweepOptions {
        repetitions: usize::try_from(args.reps)?,
        max_steps: steps,
        master_seed: resolve_seed(seed)?,
        workers: args.workers.map(usize::try_from).transpose()?,
        sampling: args.every.map_or(Sampling::Final, Sampling::Every),
        cancel: CancelToken::new(),
    };
    let table = scenario
        .sweep(grid, &options)
        .with_context(|| format!("sweeping {model}"))?;
    info!(model = %model, rows = table.len(), "batch finished");
    output::write_all(&[output::encode(&table, format, out.as_deref())?])
}
