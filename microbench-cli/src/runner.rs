//! Runner
//!
//! The handle returned by a run: how benchmarks are executed (worker
//! processes, in-process, or as a worker) and every outcome collected so far.

use microbench_core::{LoadError, LoadedBenchmarks, Namespace, load, synthesize};
use microbench_report::{FailureInfo, Report, RunnerSettings};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::executor::{BenchmarkOutcome, Executor, MeasureSettings, build_report, build_report_meta};
use crate::planner::{ExecutionPlan, build_plan};
use crate::supervisor::{Supervisor, WorkerCommand, WorkerError};
use crate::worker::{run_worker, send_report};

/// `run_namespace` calls made by this process so far, across all runners.
/// A re-launched worker replays `main` and counts the same way.
static RUN_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum RunError {
    /// The OR-joined `--mb-filter` patterns are not a valid regex
    #[error("invalid benchmark filter `{pattern}`: {source}")]
    InvalidFilter {
        /// Patterns as given, joined with `|`
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// Worker setup or protocol failure
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Where benchmarks are executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Sequential worker processes per benchmark
    Supervisor,
    /// Inside the current process
    InProcess,
    /// This process is a worker measuring one task
    Worker {
        /// Which `run_namespace` call of this process measures
        run: usize,
        /// Index into the plan
        task: usize,
        /// Expected name of that task
        name: String,
    },
}

/// Runner handle holding per-benchmark outcomes
#[derive(Debug)]
pub struct Runner {
    settings: MeasureSettings,
    mode: RunMode,
    cli_filters: Vec<String>,
    verbose: bool,
    show_progress: bool,
    outcomes: Vec<BenchmarkOutcome>,
    elapsed: Duration,
}

impl Runner {
    /// Runner using `mode`
    pub fn new(settings: MeasureSettings, mode: RunMode) -> Self {
        Self {
            settings,
            mode,
            cli_filters: Vec::new(),
            verbose: false,
            show_progress: false,
            outcomes: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Runner measuring inside the current process
    pub fn in_process(settings: MeasureSettings) -> Self {
        Self::new(settings, RunMode::InProcess)
    }

    /// Patterns received via `--mb-filter`; used when a run passes no filters
    /// and propagated to every worker
    pub fn with_cli_filters(mut self, filters: Vec<String>) -> Self {
        self.cli_filters = filters;
        self
    }

    /// Show a progress bar on stderr
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Start workers with `--verbose`
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolved measurement settings
    pub fn settings(&self) -> &MeasureSettings {
        &self.settings
    }

    /// Execution mode
    pub fn mode(&self) -> &RunMode {
        &self.mode
    }

    /// Whether this process is a worker
    pub fn is_worker(&self) -> bool {
        matches!(self.mode, RunMode::Worker { .. })
    }

    /// Patterns in effect for a run given explicit `filters`
    fn effective_filters<'a>(&'a self, filters: Option<&'a [String]>) -> &'a [String] {
        filters.unwrap_or(self.cli_filters.as_slice())
    }

    /// Plan a run without executing it
    pub fn plan(
        &self,
        namespace: &Namespace,
        prefix: &str,
        filters: Option<&[String]>,
    ) -> Result<ExecutionPlan, RunError> {
        build_plan(namespace, prefix, self.effective_filters(filters))
    }

    /// Discover, filter and measure the benchmarks of `namespace`
    ///
    /// `filters = None` uses the `--mb-filter` patterns; `Some(&[])` disables
    /// filtering. Outcomes are appended to the handle and the new ones returned.
    pub fn run_namespace(
        &mut self,
        namespace: &Namespace,
        prefix: &str,
        filters: Option<&[String]>,
    ) -> Result<&[BenchmarkOutcome], RunError> {
        let run = RUN_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let first_new = self.outcomes.len();

        if let RunMode::Worker { run: target, .. } = &self.mode {
            if *target != run {
                tracing::debug!(run, target, "worker skipping run");
                return Ok(&self.outcomes[first_new..]);
            }
        }

        let started = Instant::now();
        let plan = self.plan(namespace, prefix, filters)?;

        match &self.mode {
            RunMode::Worker { task, name, .. } => {
                let (loaded, mut failures) = load_plan(&plan);
                let (mut outcome, mut report) = run_worker(&plan, &loaded, *task, name, &self.settings)?;
                if let Some(error) = failures.remove(&outcome.name) {
                    report.failure = Some(FailureInfo {
                        kind: "load".to_string(),
                        message: error.to_string(),
                    });
                    outcome.error = Some(error.into());
                }
                send_report(&report)?;
                self.outcomes.push(outcome);
            }
            RunMode::InProcess => {
                tracing::info!("Running {} benchmarks (in-process)", plan.len());
                let (loaded, mut failures) = load_plan(&plan);
                let executor = Executor::new(self.settings.clone(), self.show_progress);
                for mut outcome in executor.execute(&plan, &loaded) {
                    if let Some(error) = failures.remove(&outcome.name) {
                        outcome.error = Some(error.into());
                    }
                    self.outcomes.push(outcome);
                }
            }
            RunMode::Supervisor => {
                tracing::info!(
                    "Running {} benchmarks, {} worker processes each",
                    plan.len(),
                    self.settings.processes
                );
                let command =
                    WorkerCommand::current(&self.settings, &self.cli_filters, self.verbose)?.for_run(run);
                let supervisor = Supervisor::new(command, self.settings.clone(), self.show_progress);
                self.outcomes.extend(supervisor.execute(&plan));
            }
        }

        self.elapsed += started.elapsed();
        Ok(&self.outcomes[first_new..])
    }

    /// Every outcome collected so far
    pub fn outcomes(&self) -> &[BenchmarkOutcome] {
        &self.outcomes
    }

    /// Outcome of the benchmark registered as `name`
    pub fn outcome(&self, name: &str) -> Option<&BenchmarkOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Whether any benchmark failed
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.passed())
    }

    /// Report over every outcome collected so far
    pub fn report(&self) -> Report {
        let settings = RunnerSettings {
            processes: self.settings.processes,
            values: self.settings.values,
            warmups: self.settings.warmups,
            loops: self.settings.loops,
            min_time_secs: self.settings.min_time.as_secs_f64(),
            in_process: self.mode == RunMode::InProcess,
            pin_cpu: self.settings.pin_cpu,
        };
        build_report(
            &self.outcomes,
            build_report_meta(settings),
            self.elapsed.as_secs_f64() * 1000.0,
        )
    }
}

/// Synthesize and bind every planned benchmark; failures are kept per name
/// and reported on that benchmark's outcome.
fn load_plan(plan: &ExecutionPlan) -> (LoadedBenchmarks, HashMap<String, LoadError>) {
    let mut loaded = LoadedBenchmarks::new();
    let mut failures = HashMap::new();
    for planned in &plan.benchmarks {
        if let Err(e) = load(synthesize(&planned.def, planned.iterations), &mut loaded) {
            tracing::warn!("{}: {}", planned.name, e);
            failures.insert(planned.name.clone(), e);
        }
    }
    (loaded, failures)
}
