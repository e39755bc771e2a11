//! Parameter sweeps over independent model runs.
//!
//! # Threading
//!
//! A run is one model built by the factory, stepped to termination and
//! reduced to table rows, all on one worker thread. Models never cross
//! threads; only the job description goes in and plain rows come out.
//! Workers pull jobs from a shared crossbeam channel and push results
//! back on another, so an idle worker always takes the next run.
//!
//! # Determinism
//!
//! Each run's seed is [`derive_seed`]`(master, combination, repetition)`
//! and the output is sorted by run index before assembly. The table is
//! therefore identical for any worker count.

use std::time::Instant;

use flock_core::{derive_seed, CancelToken, ConfigError, ParamSet, ParameterGrid, Table, Value};
use tracing::{debug, info};

use crate::agent::Agent;
use crate::error::BatchError;
use crate::model::Model;

/// Leading columns of every batch table, before parameter columns.
pub const RUN_COLUMNS: [&str; 4] = ["run_id", "combination", "repetition", "seed"];

/// Which collected rows each run contributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sampling {
    /// One row: the final state.
    #[default]
    Final,
    /// Every collected row whose tick is a multiple of `n`, plus the
    /// final state.
    Every(u64),
}

type Terminate<A> = Box<dyn Fn(&Model<A>) -> bool + Sync>;

/// Runs a model factory across a parameter grid and repetitions.
pub struct BatchRunner<A: Agent, F> {
    factory: F,
    grid: ParameterGrid,
    repetitions: usize,
    max_steps: u64,
    master_seed: u64,
    workers: Option<usize>,
    sampling: Sampling,
    terminate: Option<Terminate<A>>,
    cancel: CancelToken,
}

#[derive(Debug)]
struct Job {
    run: usize,
    combination: usize,
    repetition: usize,
    seed: u64,
    params: ParamSet,
}

#[derive(Debug)]
struct RunRows {
    run: usize,
    combination: usize,
    repetition: usize,
    seed: u64,
    params: ParamSet,
    reporters: Vec<String>,
    /// Each row starts with the tick.
    rows: Vec<Vec<Value>>,
}

enum Outcome {
    Done(RunRows),
    Failed(BatchError),
    Cancelled,
}

// Fails to compile if anything crossing the worker channels is !Send.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Job>();
        assert_send::<Outcome>();
        assert_send::<Table>();
    }
};

impl<A, F> BatchRunner<A, F>
where
    A: Agent,
    F: Fn(&ParamSet, u64) -> Result<Model<A>, ConfigError> + Sync,
{
    /// A runner over `factory`, which builds one seeded model per run.
    ///
    /// Defaults: a single empty combination, one repetition, 100 steps,
    /// master seed 0, automatic worker count, final-state sampling.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            grid: ParameterGrid::new(),
            repetitions: 1,
            max_steps: 100,
            master_seed: 0,
            workers: None,
            sampling: Sampling::default(),
            terminate: None,
            cancel: CancelToken::new(),
        }
    }

    /// Parameter grid to sweep.
    pub fn parameters(mut self, grid: ParameterGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Runs per combination.
    pub fn repetitions(mut self, n: usize) -> Self {
        self.repetitions = n;
        self
    }

    /// Step budget per run.
    pub fn max_steps(mut self, n: u64) -> Self {
        self.max_steps = n;
        self
    }

    /// Master seed from which every run's seed derives.
    pub fn master_seed(mut self, seed: u64) -> Self {
        self.master_seed = seed;
        self
    }

    /// Worker threads. Clamped to `[1, 64]` and to the number of runs.
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    /// Row sampling per run.
    pub fn sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Early termination predicate, checked after every step.
    pub fn terminate_when(mut self, done: impl Fn(&Model<A>) -> bool + Sync + 'static) -> Self {
        self.terminate = Some(Box::new(done));
        self
    }

    /// Token checked between runs and between ticks.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Number of runs the sweep will execute.
    pub fn run_count(&self) -> usize {
        self.grid.len() * self.repetitions
    }

    /// Worker count after auto-detection and clamping.
    pub fn resolved_workers(&self) -> usize {
        let n = match self.workers {
            Some(n) => n.clamp(1, 64),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(1, 16),
        };
        n.min(self.run_count().max(1))
    }

    /// Execute every run and assemble one table.
    ///
    /// Columns are [`RUN_COLUMNS`], then one per grid parameter, then
    /// `tick` and the model reporters. Rows are ordered by run index
    /// (combination-major, repetition-minor).
    ///
    /// # Errors
    ///
    /// Misconfiguration, the failure of the lowest-indexed failing run,
    /// or [`BatchError::Cancelled`].
    pub fn run(&self) -> Result<Table, BatchError> {
        self.grid.validate()?;
        if self.repetitions == 0 {
            return Err(ConfigError::invalid("repetitions", "must be at least 1").into());
        }
        if self.sampling == Sampling::Every(0) {
            return Err(ConfigError::invalid("sampling", "interval must be at least 1").into());
        }

        let started = Instant::now();
        let reps = self.repetitions;
        let jobs: Vec<Job> = self
            .grid
            .combinations()
            .into_iter()
            .enumerate()
            .flat_map(|(c, params)| {
                (0..reps).map(move |r| Job {
                    run: c * reps + r,
                    combination: c,
                    repetition: r,
                    seed: derive_seed(self.master_seed, c, r),
                    params: params.clone(),
                })
            })
            .collect();
        let total = jobs.len();
        let workers = self.resolved_workers();

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (out_tx, out_rx) = crossbeam_channel::unbounded::<(usize, Outcome)>();
        for job in jobs {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let rx = job_rx.clone();
                let tx = out_tx.clone();
                s.spawn(move || {
                    while let Ok(job) = rx.recv() {
                        let run = job.run;
                        let outcome = if self.cancel.is_cancelled() {
                            Outcome::Cancelled
                        } else {
                            self.execute(job)
                        };
                        if tx.send((run, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(out_tx);

        let mut outcomes: Vec<(usize, Outcome)> = out_rx.iter().collect();
        outcomes.sort_by_key(|(run, _)| *run);

        let mut done = Vec::with_capacity(total);
        let mut cancelled = false;
        for (_, outcome) in outcomes {
            match outcome {
                Outcome::Done(rows) => done.push(rows),
                Outcome::Failed(e) => return Err(e),
                Outcome::Cancelled => cancelled = true,
            }
        }
        if cancelled {
            return Err(BatchError::Cancelled {
                completed: done.len(),
                total,
            });
        }

        let table = assemble(&done)?;
        info!(
            runs = total,
            workers,
            rows = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );
        Ok(table)
    }

    fn execute(&self, job: Job) -> Outcome {
        match self.execute_inner(&job) {
            Ok(Some((reporters, rows))) => Outcome::Done(RunRows {
                run: job.run,
                combination: job.combination,
                repetition: job.repetition,
                seed: job.seed,
                params: job.params,
                reporters,
                rows,
            }),
            Ok(None) => Outcome::Cancelled,
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Build, step and sample one run. `Ok(None)` when cancelled mid-run.
    #[allow(clippy::type_complexity)]
    fn execute_inner(&self, job: &Job) -> Result<Option<(Vec<String>, Vec<Vec<Value>>)>, BatchError> {
        let run = job.run;
        let mut model = (self.factory)(&job.params, job.seed)
            .map_err(|source| BatchError::Build { run, source })?;
        for _ in 0..self.max_steps {
            if !model.running() {
                break;
            }
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            model.step().map_err(|source| BatchError::Run { run, source })?;
            if self.terminate.as_ref().is_some_and(|done| done(&model)) {
                break;
            }
        }
        model.finish();
        debug!(run, seed = job.seed, tick = model.tick().0, "run complete");

        let final_tick = model.tick().0;
        let Some(collector) = model.collector() else {
            return Ok(Some((Vec::new(), vec![vec![Value::from(final_tick)]])));
        };
        let reporters: Vec<String> = collector.model_reporters().map(str::to_owned).collect();
        let wide = collector.model_wide();
        let mut rows: Vec<Vec<Value>> = match self.sampling {
            Sampling::Final => wide.rows().last().cloned().into_iter().collect(),
            Sampling::Every(n) => wide
                .rows()
                .iter()
                .filter(|row| row[0].as_i64().is_some_and(|t| t as u64 % n == 0))
                .cloned()
                .collect(),
        };
        let has_final = rows
            .last()
            .is_some_and(|row| row[0].as_i64() == Some(final_tick as i64));
        if !has_final {
            if let Some(last) = wide.rows().last() {
                if last[0].as_i64() == Some(final_tick as i64) {
                    rows.push(last.clone());
                }
            }
        }
        if rows.is_empty() {
            let mut row = vec![Value::from(final_tick)];
            row.resize(reporters.len() + 1, Value::Null);
            rows.push(row);
        }
        Ok(Some((reporters, rows)))
    }
}

fn assemble(runs: &[RunRows]) -> Result<Table, BatchError> {
    let Some(first) = runs.first() else {
        return Ok(Table::new(RUN_COLUMNS));
    };
    let param_names: Vec<String> = first.params.iter().map(|(k, _)| k.to_owned()).collect();
    let header = RUN_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(param_names.iter().cloned())
        .chain(std::iter::once("tick".to_owned()))
        .chain(first.reporters.iter().cloned());
    let mut table = Table::new(header);

    for r in runs {
        if r.reporters != first.reporters {
            return Err(ConfigError::invalid(
                "reporters",
                format!("run {} reports different columns than run 0", r.run),
            )
            .into());
        }
        for row in &r.rows {
            let mut out = vec![
                Value::from(r.run),
                Value::from(r.combination),
                Value::from(r.repetition),
                Value::from(r.seed),
            ];
            out.extend(param_names.iter().map(|k| r.params.get(k).cloned().unwrap_or_default()));
            out.extend(row.iter().cloned());
            table.push_row(out)?;
        }
    }
    Ok(table)
}
