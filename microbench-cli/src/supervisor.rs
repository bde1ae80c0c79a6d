//! Supervisor Process
//!
//! Re-launches the current executable once per (benchmark, process) pair and
//! collects one [`WorkerReport`] from each worker.
//!
//! Workers are started with `--worker --worker-run R --worker-task K
//! --worker-name NAME --loops L`, the measurement flags, and every
//! `--mb-filter` pattern the supervisor received. The worker replays the
//! binary's `main`, measures only during its `R`-th run and plans exactly
//! like the supervisor did, so task `K` is the same benchmark in both. On Unix the report travels over a pipe inherited as fd 3; the
//! worker's stdout is discarded so benchmark output cannot corrupt it.
//! Elsewhere the worker prints the report as its last stdout line.

use microbench_report::FailureInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::executor::{BenchmarkError, BenchmarkOutcome, MeasureSettings, ProcessValues, progress_bar};
use crate::planner::{ExecutionPlan, PlannedBenchmark};

/// Environment variable naming the descriptor a worker writes its report to
pub const REPORT_FD_ENV: &str = "MICROBENCH_REPORT_FD";

/// Descriptor the report pipe is inherited as
#[cfg(unix)]
pub const REPORT_FD: i32 = 3;

/// Supervisor / worker failures
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker process could not be started
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    /// Reading the report channel failed
    #[error("worker I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker exited without writing a report
    #[error("worker exited ({status}) without a report")]
    Crashed {
        /// Exit status as displayed by the OS
        status: String,
    },

    /// The report line is not a valid report
    #[error("malformed worker report: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The report belongs to another task
    #[error("worker reported task {got_task} `{got_name}`, expected task {task} `{name}`")]
    UnexpectedReport {
        /// Task the worker was started for
        task: usize,
        /// Benchmark the worker was started for
        name: String,
        /// Task named in the report
        got_task: usize,
        /// Benchmark named in the report
        got_name: String,
    },

    /// The worker planned a different benchmark at this index
    #[error(
        "worker plan mismatch: task {task} should be `{expected}` but is {}",
        .found.as_deref().map(|f| format!("`{}`", f)).unwrap_or_else(|| "missing".to_string())
    )]
    PlanMismatch {
        /// Index the worker was asked to measure
        task: usize,
        /// Name the supervisor planned at that index
        expected: String,
        /// Name the worker planned there, if the index exists
        found: Option<String>,
    },

    /// The worker reported a non-panic failure
    #[error("{kind}: {message}")]
    Failed {
        /// Failure category
        kind: String,
        /// Failure detail
        message: String,
    },
}

/// What a worker sends back: one process worth of values, or why it failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Plan index the worker measured
    pub task: usize,
    /// Registered name of that benchmark
    pub name: String,
    /// Outer loop count used (calibrated when the worker was given 0)
    pub loops: u64,
    /// Per-call warmup values, in seconds
    pub warmups: Vec<f64>,
    /// Per-call timed values, in seconds
    pub values: Vec<f64>,
    /// Set when the benchmark failed in the worker
    pub failure: Option<FailureInfo>,
}

impl WorkerReport {
    /// Single-line JSON encoding
    pub fn to_line(&self) -> Result<String, WorkerError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the last non-empty line of `output`
    pub fn parse(output: &str) -> Result<Self, WorkerError> {
        let line = output
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();
        Ok(serde_json::from_str(line)?)
    }

    /// Values of a successful process, or the failure it reported
    pub fn into_values(self) -> Result<ProcessValues, BenchmarkError> {
        match self.failure {
            Some(FailureInfo { kind, message }) if kind == "panic" => {
                Err(BenchmarkError::Panicked(message))
            }
            Some(FailureInfo { kind, message }) => {
                Err(WorkerError::Failed { kind, message }.into())
            }
            None => Ok(ProcessValues {
                loops: self.loops,
                warmups: self.warmups,
                values: self.values,
            }),
        }
    }
}

/// How to re-launch the current executable as a worker
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    run: usize,
    shared_args: Vec<String>,
    filters: Vec<String>,
}

impl WorkerCommand {
    /// Re-launch `std::env::current_exe()`
    pub fn current(settings: &MeasureSettings, filters: &[String], verbose: bool) -> Result<Self, WorkerError> {
        let program = std::env::current_exe().map_err(WorkerError::Spawn)?;
        Ok(Self::new(program, settings, filters, verbose))
    }

    /// Re-launch `program` with the measurement settings and `--mb-filter` patterns
    pub fn new(program: impl Into<PathBuf>, settings: &MeasureSettings, filters: &[String], verbose: bool) -> Self {
        let mut shared_args = vec![
            format!("--values={}", settings.values),
            format!("--warmups={}", settings.warmups),
            format!("--min-time={}ns", settings.min_time.as_nanos()),
        ];
        if let Some(cpu) = settings.pin_cpu {
            shared_args.push(format!("--pin-cpu={}", cpu));
        }
        if verbose {
            shared_args.push("--verbose".to_string());
        }

        Self {
            program: program.into(),
            run: 0,
            shared_args,
            filters: filters.to_vec(),
        }
    }

    /// Target the `run`-th `run_namespace` call of the re-launched process
    pub fn for_run(mut self, run: usize) -> Self {
        self.run = run;
        self
    }

    /// Executable workers are started from
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Full argument list for one worker
    pub fn args_for(&self, task: usize, name: &str, loops: u64) -> Vec<String> {
        let mut args = vec![
            "--worker".to_string(),
            format!("--worker-run={}", self.run),
            format!("--worker-task={}", task),
            format!("--worker-name={}", name),
            format!("--loops={}", loops),
        ];
        args.extend(self.shared_args.iter().cloned());
        args.extend(self.filters.iter().map(|f| format!("--mb-filter={}", f)));
        args
    }

    /// Start one worker and return everything it wrote to the report channel
    #[cfg(unix)]
    pub fn run(&self, args: &[String]) -> Result<String, WorkerError> {
        use std::io::Read;
        use std::os::unix::io::FromRawFd;
        use std::os::unix::process::CommandExt;

        let (read_fd, write_fd) = create_pipe().map_err(WorkerError::Spawn)?;

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .env(REPORT_FD_ENV, REPORT_FD.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // In the child: close the read end, move the write end to fd 3.
        unsafe {
            command.pre_exec(move || {
                if read_fd != REPORT_FD {
                    libc::close(read_fd);
                }
                if write_fd != REPORT_FD {
                    libc::dup2(write_fd, REPORT_FD);
                    libc::close(write_fd);
                }
                let flags = libc::fcntl(REPORT_FD, libc::F_GETFD);
                libc::fcntl(REPORT_FD, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
                Ok(())
            });
        }

        let mut child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(read_fd);
                close_fd(write_fd);
                return Err(WorkerError::Spawn(e));
            }
        };

        // Only the child may hold the write end, or the read below never sees EOF
        close_fd(write_fd);
        let mut reader = unsafe { std::fs::File::from_raw_fd(read_fd) };
        let mut output = String::new();
        let read = reader.read_to_string(&mut output);
        let status = child.wait()?;
        read?;

        if output.trim().is_empty() {
            return Err(WorkerError::Crashed {
                status: status.to_string(),
            });
        }
        Ok(output)
    }

    /// Start one worker and return its stdout
    #[cfg(not(unix))]
    pub fn run(&self, args: &[String]) -> Result<String, WorkerError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(WorkerError::Spawn)?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(WorkerError::Crashed {
                status: output.status.to_string(),
            });
        }
        Ok(text)
    }
}

/// Create a pipe pair with close-on-exec set, returning (read_fd, write_fd).
#[cfg(unix)]
fn create_pipe() -> Result<(i32, i32), std::io::Error> {
    let mut fds = [0 as libc::c_int; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

#[cfg(unix)]
fn close_fd(fd: i32) {
    unsafe {
        libc::close(fd);
    }
}

/// Runs every planned benchmark in a sequence of worker processes
pub struct Supervisor {
    command: WorkerCommand,
    settings: MeasureSettings,
    show_progress: bool,
}

impl Supervisor {
    /// Create a supervisor launching workers with `command`
    pub fn new(command: WorkerCommand, settings: MeasureSettings, show_progress: bool) -> Self {
        Self {
            command,
            settings,
            show_progress,
        }
    }

    /// Execute all planned benchmarks, one after another
    pub fn execute(&self, plan: &ExecutionPlan) -> Vec<BenchmarkOutcome> {
        let pb = progress_bar(plan.len(), self.show_progress);
        let mut outcomes = Vec::with_capacity(plan.len());
        for (task, planned) in plan.benchmarks.iter().enumerate() {
            pb.set_message(planned.display_name.clone());
            outcomes.push(self.execute_single(task, planned));
            pb.inc(1);
        }
        pb.finish_and_clear();
        outcomes
    }

    /// Run `processes` workers for one benchmark; the first calibrates when loops is unset
    fn execute_single(&self, task: usize, planned: &PlannedBenchmark) -> BenchmarkOutcome {
        let mut outcome = BenchmarkOutcome::new(planned);
        let mut loops = self.settings.loops;

        for process in 0..self.settings.processes {
            let result = self
                .spawn(task, planned, loops)
                .map_err(BenchmarkError::from)
                .and_then(WorkerReport::into_values);
            match result {
                Ok(values) => {
                    loops = values.loops;
                    outcome.absorb(values);
                }
                Err(e) => {
                    tracing::warn!("{} failed in worker {}: {}", planned.name, process + 1, e);
                    outcome.error = Some(e);
                    break;
                }
            }
        }
        outcome
    }

    /// Start one worker for `planned` and check that it answered for the right task
    pub fn spawn(&self, task: usize, planned: &PlannedBenchmark, loops: u64) -> Result<WorkerReport, WorkerError> {
        let args = self.command.args_for(task, &planned.name, loops);
        tracing::debug!(
            "spawning worker: {} {}",
            self.command.program().display(),
            args.join(" ")
        );

        let report = WorkerReport::parse(&self.command.run(&args)?)?;
        if report.task != task || report.name != planned.name {
            return Err(WorkerError::UnexpectedReport {
                task,
                name: planned.name.clone(),
                got_task: report.task,
                got_name: report.name,
            });
        }
        Ok(report)
    }
}
