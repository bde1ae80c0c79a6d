#![warn(missing_docs)]
//! microbench CLI Library
//!
//! Discovery, filtering and measurement for benchmark binaries. Use
//! `microbench::run()` (or `microbench_cli::run()`) as the body of `main` to
//! get the full command line with every `#[bench]` function in the binary.
//!
//! # Example
//!
//! ```ignore
//! #[microbench::bench]
//! fn bench_add() {
//!     'init: { let x = 1; }
//!     'bench: { let y = x + 1; }
//!     'verify: { assert_eq!(y, 2); }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     microbench_cli::run()
//! }
//! ```

mod config;
mod executor;
mod planner;
mod runner;
mod supervisor;
mod worker;

pub use config::*;
pub use executor::{
    BenchmarkError, BenchmarkOutcome, Executor, MAX_LOOPS, MeasureSettings, ProcessValues,
    build_report, calibrate_loops, measure_process,
};
pub use planner::{ExecutionPlan, PlannedBenchmark, build_plan, compile_filters};
pub use runner::{RunError, RunMode, Runner};
pub use supervisor::{REPORT_FD_ENV, Supervisor, WorkerCommand, WorkerError, WorkerReport};
pub use worker::{run_worker, send_report};

use anyhow::Context;
use clap::Parser;
use microbench_core::{DEFAULT_PREFIX, Namespace};
use microbench_report::{OutputFormat, format_human_output, generate_json_report};
use std::fmt::Write as _;
use std::path::PathBuf;

/// microbench CLI arguments
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "microbench")]
#[command(author, version, about = "microbench - micro-benchmark harness")]
pub struct Cli {
    /// Only run benchmarks whose name matches one of these regexes
    #[arg(long = "mb-filter", value_name = "PATTERN", num_args = 0..)]
    pub mb_filter: Vec<String>,

    /// Worker processes per benchmark
    #[arg(short, long)]
    pub processes: Option<usize>,

    /// Timed values per process
    #[arg(short = 'n', long)]
    pub values: Option<usize>,

    /// Warmup values per process
    #[arg(short, long)]
    pub warmups: Option<usize>,

    /// Outer loop count (0 = calibrate)
    #[arg(short, long)]
    pub loops: Option<u64>,

    /// Calibration target per value (e.g., "100ms")
    #[arg(long, value_name = "DURATION")]
    pub min_time: Option<String>,

    /// Half the processes
    #[arg(long, conflicts_with = "rigorous")]
    pub fast: bool,

    /// Twice the processes and twice the calibration target
    #[arg(long)]
    pub rigorous: bool,

    /// Run benchmarks inside this process instead of worker processes
    #[arg(long)]
    pub in_process: bool,

    /// Pin the measuring thread to this CPU (Linux only)
    #[arg(long, value_name = "CPU")]
    pub pin_cpu: Option<usize>,

    /// Output format: human, json
    #[arg(long)]
    pub format: Option<String>,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// List the planned benchmarks without running them
    #[arg(long)]
    pub list: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only warnings and results
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Internal: run as worker process (used by supervisor)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// Internal: which `run_namespace` call of the process the worker measures
    #[arg(long, hide = true, requires = "worker")]
    pub worker_run: Option<usize>,

    /// Internal: plan index the worker measures
    #[arg(long, hide = true, requires = "worker")]
    pub worker_task: Option<usize>,

    /// Internal: expected name of that plan entry
    #[arg(long, hide = true, requires = "worker")]
    pub worker_name: Option<String>,

    /// Internal: Absorb cargo bench's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,
}

/// Run every `#[bench]` function of this binary with the process arguments.
/// This is the main entry point for benchmark binaries.
///
/// # Returns
/// `Ok(())` when every benchmark passed; an error naming the failures otherwise.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run every `#[bench]` function of this binary with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let runner = run_namespace_with_cli(cli, &Namespace::collect(), DEFAULT_PREFIX, None)?;
    if !runner.is_worker() && runner.has_failures() {
        let failed = runner.outcomes().iter().filter(|o| !o.passed()).count();
        anyhow::bail!("{} of {} benchmarks failed", failed, runner.outcomes().len());
    }
    Ok(())
}

/// Run the benchmarks of `namespace` whose name starts with `prefix`, using
/// the process arguments for settings and `--mb-filter` patterns.
///
/// `filters = None` takes the patterns from `--mb-filter`.
pub fn run_namespace(
    namespace: &Namespace,
    prefix: &str,
    filters: Option<&[String]>,
) -> anyhow::Result<Runner> {
    run_namespace_with_cli(Cli::parse(), namespace, prefix, filters)
}

/// [`run_namespace`] with pre-parsed arguments
pub fn run_namespace_with_cli(
    cli: Cli,
    namespace: &Namespace,
    prefix: &str,
    filters: Option<&[String]>,
) -> anyhow::Result<Runner> {
    init_logging(&cli);

    // Discover microbench.toml configuration (CLI flags override)
    let config = MicrobenchConfig::discover().unwrap_or_default();
    let mut runner = build_runner(&cli, &config)?;

    if cli.list {
        let plan = runner.plan(namespace, prefix, filters)?;
        print!("{}", format_plan(&plan));
        return Ok(runner);
    }

    runner.run_namespace(namespace, prefix, filters)?;
    if runner.is_worker() {
        return Ok(runner);
    }

    let report = runner.report();
    let format: OutputFormat = match cli.format.as_deref().unwrap_or(config.output.format.as_str()).parse() {
        Ok(format) => format,
        Err(e) => {
            tracing::warn!("{}; using human output", e);
            OutputFormat::Human
        }
    };
    let output = match format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Human => format_human_output(&report),
    };
    print!("{}", output);

    if let Some(path) = &cli.output {
        let path = config.output_path(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, generate_json_report(&report)?)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("Report written to: {}", path.display());
    }

    Ok(runner)
}

/// Install the stderr log subscriber; `RUST_LOG` wins over the flags.
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet || cli.worker {
        "warn"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("microbench={}", level)));

    // A second call (tests, repeated runs) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Layer defaults, microbench.toml and CLI flags into measurement settings.
pub fn resolve_settings(cli: &Cli, config: &MicrobenchConfig) -> anyhow::Result<MeasureSettings> {
    let defaults = MeasureSettings::default();
    let runner = &config.runner;

    let min_time = match cli.min_time.as_deref().or(runner.min_time.as_deref()) {
        Some(s) => MicrobenchConfig::parse_duration(s)?,
        None => defaults.min_time,
    };

    let mut settings = MeasureSettings {
        processes: cli.processes.or(runner.processes).unwrap_or(defaults.processes),
        values: cli.values.or(runner.values).unwrap_or(defaults.values),
        warmups: cli.warmups.or(runner.warmups).unwrap_or(defaults.warmups),
        loops: cli.loops.or(runner.loops).unwrap_or(defaults.loops),
        min_time,
        pin_cpu: cli.pin_cpu.or(runner.pin_cpu),
    };

    if settings.processes == 0 {
        anyhow::bail!("--processes must be at least 1");
    }
    if settings.values == 0 {
        anyhow::bail!("--values must be at least 1");
    }

    // Workers get explicit values from their supervisor
    if !cli.worker {
        if cli.fast {
            settings = settings.fast();
        }
        if cli.rigorous {
            settings = settings.rigorous();
        }
    }

    Ok(settings)
}

/// Build the runner the flags describe
pub fn build_runner(cli: &Cli, config: &MicrobenchConfig) -> anyhow::Result<Runner> {
    let settings = resolve_settings(cli, config)?;

    let mode = if cli.worker {
        RunMode::Worker {
            run: cli.worker_run.unwrap_or(0),
            task: cli.worker_task.context("--worker requires --worker-task")?,
            name: cli.worker_name.clone().context("--worker requires --worker-name")?,
        }
    } else if cli.in_process || config.runner.in_process {
        RunMode::InProcess
    } else {
        RunMode::Supervisor
    };

    let show_progress = !cli.quiet && !cli.worker;
    Ok(Runner::new(settings, mode)
        .with_cli_filters(cli.mb_filter.clone())
        .with_progress(show_progress)
        .with_verbose(cli.verbose))
}

/// Text listing of a plan
pub fn format_plan(plan: &ExecutionPlan) -> String {
    if plan.is_empty() {
        return "No benchmarks found.\n".to_string();
    }

    let mut out = String::new();
    for planned in &plan.benchmarks {
        let shown = if planned.display_name != planned.name {
            format!("{} ({})", planned.name, planned.display_name)
        } else {
            planned.name.clone()
        };
        let location = planned
            .def
            .location
            .as_ref()
            .map(|l| format!("  {}:{}", l.file, l.line))
            .unwrap_or_default();
        let _ = writeln!(out, "{}  [iterations: {}]{}", shown, planned.iterations, location);
    }
    let _ = writeln!(out, "{} benchmarks found.", plan.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use microbench_core::{BenchmarkDef, Sections, configure};
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_filters_accept_several_values_and_repeats() {
        let cli = parse(&["--mb-filter", "a", "b", "--mb-filter=c"]);
        assert_eq!(cli.mb_filter, ["a", "b", "c"]);
        assert!(parse(&[]).mb_filter.is_empty());
    }

    #[test]
    fn test_bare_filter_flag_keeps_everything() {
        let cli = parse(&["--mb-filter", "--in-process"]);
        assert!(cli.mb_filter.is_empty());

        let ns: Namespace = ["bench_a", "bench_b"]
            .into_iter()
            .map(|n| BenchmarkDef::from_sections(n, Sections::new(|| (), |_| (), |_, _| {})))
            .collect();
        let settings = MeasureSettings {
            processes: 1,
            values: 1,
            warmups: 0,
            loops: 2,
            ..MeasureSettings::default()
        };
        let mut runner = Runner::in_process(settings).with_cli_filters(cli.mb_filter.clone());
        let outcomes = runner.run_namespace(&ns, DEFAULT_PREFIX, None).unwrap();
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn test_cargo_bench_flag_absorbed() {
        let cli = parse(&["--bench"]);
        assert!(cli.bench);
    }

    #[test]
    fn test_worker_flags_require_worker() {
        assert!(Cli::try_parse_from(["bench", "--worker-task", "1"]).is_err());
    }

    #[test]
    fn test_worker_command_round_trips_through_cli() {
        let settings = MeasureSettings {
            processes: 4,
            values: 5,
            warmups: 0,
            loops: 0,
            min_time: Duration::from_millis(50),
            pin_cpu: None,
        };
        let filters = vec!["^bench_a".to_string(), "-x".to_string()];
        let command = WorkerCommand::new("/bin/bench", &settings, &filters, false);
        let args = command.for_run(2).args_for(3, "bench_a", 128);
        let cli = Cli::try_parse_from(std::iter::once("bench".to_string()).chain(args)).unwrap();

        assert!(cli.worker);
        assert_eq!(cli.worker_run, Some(2));
        assert_eq!(cli.worker_task, Some(3));
        assert_eq!(cli.worker_name.as_deref(), Some("bench_a"));
        assert_eq!(cli.loops, Some(128));
        assert_eq!(cli.mb_filter, filters);

        let worker_settings = resolve_settings(&cli, &MicrobenchConfig::default()).unwrap();
        assert_eq!(worker_settings.values, 5);
        assert_eq!(worker_settings.warmups, 0);
        assert_eq!(worker_settings.loops, 128);
        assert_eq!(worker_settings.min_time, Duration::from_millis(50));
    }

    #[test]
    fn test_settings_layering() {
        let mut config = MicrobenchConfig::default();
        config.runner.processes = Some(6);
        config.runner.values = Some(4);
        config.runner.min_time = Some("20ms".to_string());

        let settings = resolve_settings(&parse(&["-n", "9"]), &config).unwrap();
        assert_eq!(settings.processes, 6);
        assert_eq!(settings.values, 9);
        assert_eq!(settings.warmups, MeasureSettings::default().warmups);
        assert_eq!(settings.min_time, Duration::from_millis(20));

        let fast = resolve_settings(&parse(&["--fast"]), &config).unwrap();
        assert_eq!(fast.processes, 3);
        let rigorous = resolve_settings(&parse(&["--rigorous"]), &config).unwrap();
        assert_eq!(rigorous.processes, 12);
        assert_eq!(rigorous.min_time, Duration::from_millis(40));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config = MicrobenchConfig::default();
        assert!(resolve_settings(&parse(&["-n", "0"]), &config).is_err());
        assert!(resolve_settings(&parse(&["--min-time", "soon"]), &config).is_err());
    }

    #[test]
    fn test_build_runner_modes() {
        let config = MicrobenchConfig::default();
        assert_eq!(build_runner(&parse(&[]), &config).unwrap().mode(), &RunMode::Supervisor);
        assert_eq!(
            build_runner(&parse(&["--in-process"]), &config).unwrap().mode(),
            &RunMode::InProcess
        );
        let worker = build_runner(
            &parse(&["--worker", "--worker-task", "2", "--worker-name", "bench_x"]),
            &config,
        )
        .unwrap();
        assert!(worker.is_worker());
        assert!(build_runner(&parse(&["--worker", "--worker-task", "2"]), &config).is_err());
    }

    #[test]
    fn test_format_plan() {
        let mut ns: Namespace = ["bench_a", "bench_b"]
            .into_iter()
            .map(|n| BenchmarkDef::from_sections(n, Sections::new(|| (), |_| (), |_, _| {})))
            .collect();
        ns.configure("bench_b", &configure().iterations(5).name("custom")).unwrap();

        let plan = build_plan(&ns, DEFAULT_PREFIX, &[]).unwrap();
        let text = format_plan(&plan);
        assert!(text.contains("bench_a  [iterations: 20]"));
        assert!(text.contains("bench_b (custom)  [iterations: 5]"));
        assert!(text.ends_with("2 benchmarks found.\n"));

        let empty = build_plan(&ns, "nothing_", &[]).unwrap();
        assert_eq!(format_plan(&empty), "No benchmarks found.\n");
    }
}
