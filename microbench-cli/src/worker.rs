//! Worker Mode
//!
//! A worker is the benchmark executable started with `--worker`. It rebuilds
//! the plan exactly like its supervisor, measures the one task it was given,
//! and sends a single [`WorkerReport`] back.

use microbench_core::LoadedBenchmarks;
use microbench_report::FailureInfo;
use std::io::Write;

use crate::executor::{BenchmarkError, BenchmarkOutcome, MeasureSettings, apply_cpu_pinning, measure_process};
use crate::planner::ExecutionPlan;
use crate::supervisor::{REPORT_FD_ENV, WorkerError, WorkerReport};

/// Measure task `task` of `plan`, which must be the benchmark called `name`
pub fn run_worker(
    plan: &ExecutionPlan,
    loaded: &LoadedBenchmarks,
    task: usize,
    name: &str,
    settings: &MeasureSettings,
) -> Result<(BenchmarkOutcome, WorkerReport), WorkerError> {
    let planned = match plan.benchmarks.get(task) {
        Some(planned) if planned.name == name => planned,
        other => {
            return Err(WorkerError::PlanMismatch {
                task,
                expected: name.to_string(),
                found: other.map(|p| p.name.clone()),
            });
        }
    };

    apply_cpu_pinning(settings);

    let mut outcome = BenchmarkOutcome::new(planned);
    let measured = match loaded.get(&planned.name) {
        Some(timing) => measure_process(&timing, planned.iterations, settings.loops, settings),
        None => Err(BenchmarkError::NotLoaded(planned.name.clone())),
    };

    let mut report = WorkerReport {
        task,
        name: planned.name.clone(),
        loops: 0,
        warmups: Vec::new(),
        values: Vec::new(),
        failure: None,
    };
    match measured {
        Ok(values) => {
            report.loops = values.loops;
            report.warmups = values.warmups.clone();
            report.values = values.values.clone();
            outcome.absorb(values);
        }
        Err(e) => {
            report.failure = Some(FailureInfo {
                kind: e.kind().to_string(),
                message: e.message(),
            });
            outcome.error = Some(e);
        }
    }

    tracing::debug!(task, name, loops = report.loops, "worker finished");
    Ok((outcome, report))
}

/// Descriptor inherited from the supervisor, if any
#[cfg(unix)]
fn open_report_channel() -> Option<std::fs::File> {
    use std::os::unix::io::FromRawFd;

    let fd: i32 = std::env::var(REPORT_FD_ENV).ok()?.parse().ok()?;
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return None;
    }
    Some(unsafe { std::fs::File::from_raw_fd(fd) })
}

#[cfg(not(unix))]
fn open_report_channel() -> Option<std::fs::File> {
    None
}

/// Send `report` to the supervisor: the inherited pipe, or stdout without one
pub fn send_report(report: &WorkerReport) -> Result<(), WorkerError> {
    let line = report.to_line()?;
    match open_report_channel() {
        Some(mut channel) => writeln!(channel, "{}", line)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", line)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::build_plan;
    use microbench_core::{BenchmarkDef, Namespace, Sections, load, synthesize};

    fn namespace() -> Namespace {
        Namespace::new()
            .with(BenchmarkDef::from_sections(
                "bench_ok",
                Sections::new(|| 2_u64, |x| *x * 3, |_, last: Option<u64>| assert_eq!(last, Some(6))),
            ))
            .with(BenchmarkDef::from_sections(
                "bench_broken",
                Sections::new(|| 2_u64, |x| *x * 3, |_, last: Option<u64>| assert_eq!(last, Some(7))),
            ))
    }

    fn loaded(plan: &ExecutionPlan) -> LoadedBenchmarks {
        let mut loaded = LoadedBenchmarks::new();
        for planned in &plan.benchmarks {
            load(synthesize(&planned.def, planned.iterations), &mut loaded).unwrap();
        }
        loaded
    }

    fn settings() -> MeasureSettings {
        MeasureSettings {
            processes: 1,
            values: 2,
            warmups: 1,
            loops: 3,
            ..MeasureSettings::default()
        }
    }

    #[test]
    fn test_worker_measures_its_task() {
        let plan = build_plan(&namespace(), "bench_", &[]).unwrap();
        let (outcome, report) = run_worker(&plan, &loaded(&plan), 0, "bench_ok", &settings()).unwrap();

        assert!(outcome.passed());
        assert_eq!(report.task, 0);
        assert_eq!(report.loops, 3);
        assert_eq!(report.values.len(), 2);
        assert_eq!(report.warmups.len(), 1);
        assert!(report.failure.is_none());
    }

    #[test]
    fn test_worker_reports_failures() {
        let plan = build_plan(&namespace(), "bench_", &[]).unwrap();
        let (outcome, report) = run_worker(&plan, &loaded(&plan), 1, "bench_broken", &settings()).unwrap();

        assert!(!outcome.passed());
        assert_eq!(report.failure.map(|f| f.kind), Some("panic".to_string()));
    }

    #[test]
    fn test_worker_plan_mismatch() {
        // The worker saw different filters than its supervisor
        let filters = vec!["broken".to_string()];
        let plan = build_plan(&namespace(), "bench_", &filters).unwrap();
        let err = run_worker(&plan, &loaded(&plan), 0, "bench_ok", &settings()).err();
        assert!(matches!(
            err,
            Some(WorkerError::PlanMismatch { task: 0, ref found, .. }) if found.as_deref() == Some("bench_broken")
        ));

        let err = run_worker(&plan, &loaded(&plan), 5, "bench_ok", &settings()).err();
        assert!(matches!(err, Some(WorkerError::PlanMismatch { found: None, .. })));
    }
}
