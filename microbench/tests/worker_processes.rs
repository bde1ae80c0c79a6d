//! Worker-process runs end to end
//!
//! This binary is its own worker: the supervisor re-launches it with
//! `--worker ...`, and the relaunched process replays `main` up to the run it
//! was asked to measure. Two runs in one process check that every run reaches
//! the right worker plan.

use microbench::{Cli, Namespace, Runner, run_namespace_with_cli};

// Defined first so a worker that missed the filter would plan it at task 0
#[microbench::bench]
fn bench_dropped() {
    'bench: {
        let _unused = 0_u8;
    }
}

#[microbench::bench]
#[microbench::configure(iterations = 4)]
fn bench_kept() {
    'init: {
        let base = 40_u64;
    }
    'bench: {
        let answer = base + 2;
    }
    'verify: {
        assert_eq!(answer, 42);
    }
}

#[microbench::bench]
fn other_second() {
    'init: {
        let words = vec!["a", "bb", "ccc"];
    }
    'bench: {
        let total: usize = words.iter().map(|w| w.len()).sum();
    }
    'verify: {
        assert_eq!(total, 6);
    }
}

fn supervisor_cli() -> Cli {
    Cli {
        mb_filter: vec!["kept".to_string(), "second".to_string()],
        processes: Some(2),
        values: Some(2),
        warmups: Some(0),
        loops: Some(10),
        quiet: true,
        ..Cli::default()
    }
}

fn run_both(cli: &Cli) -> anyhow::Result<(Runner, Runner)> {
    let namespace = Namespace::collect();
    let first = run_namespace_with_cli(cli.clone(), &namespace, "bench_", None)?;
    let second = run_namespace_with_cli(cli.clone(), &namespace, "other_", None)?;
    Ok((first, second))
}

fn summary(runner: &Runner) -> Vec<(String, bool, usize)> {
    runner
        .outcomes()
        .iter()
        .map(|o| (o.name.clone(), o.passed(), o.values.len()))
        .collect()
}

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--worker") {
        use clap::Parser;
        run_both(&Cli::parse())?;
        return Ok(());
    }

    let (first, second) = run_both(&supervisor_cli())?;

    // --mb-filter reached the workers: bench_dropped was never planned there
    assert_eq!(summary(&first), [("bench_kept".to_string(), true, 4)]);
    assert_eq!(summary(&second), [("other_second".to_string(), true, 4)]);
    assert_eq!(first.outcomes()[0].iterations, 4);
    assert_eq!(first.outcomes()[0].loops, 10);
    assert!(first.outcomes()[0].values.iter().all(|v| *v >= 0.0));

    println!("worker_processes: ok");
    Ok(())
}
