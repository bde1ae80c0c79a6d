//! Benchmark Planner
//!
//! Builds the execution plan from a namespace:
//! - Discovery: names starting with the prefix, in namespace order
//! - Filtering: every pattern OR-joined into one regex, matched anywhere in the name
//! - Resolution: iteration count and display name per benchmark
//!
//! Supervisor and workers build the plan the same way, so a task index means
//! the same benchmark in both.

use microbench_core::{BenchmarkDef, Namespace};
use regex::Regex;

use crate::runner::RunError;

/// A benchmark selected for execution, with its settings resolved
#[derive(Debug, Clone)]
pub struct PlannedBenchmark {
    /// Registered name
    pub name: String,
    /// Name used in output
    pub display_name: String,
    /// Inner (unroll) loop count
    pub iterations: u64,
    /// The definition itself
    pub def: BenchmarkDef,
}

impl PlannedBenchmark {
    fn resolve(def: &BenchmarkDef) -> Self {
        Self {
            name: def.name.clone(),
            display_name: def.resolved_name().to_string(),
            iterations: def.resolved_iterations(),
            def: def.clone(),
        }
    }
}

/// Ordered list of benchmarks to run
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    /// Benchmarks in execution order
    pub benchmarks: Vec<PlannedBenchmark>,
}

impl ExecutionPlan {
    /// Number of planned benchmarks
    pub fn len(&self) -> usize {
        self.benchmarks.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }
}

/// OR-join `patterns` into one regex; no patterns means no filtering.
pub fn compile_filters(patterns: &[String]) -> Result<Option<Regex>, RunError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let joined = patterns
        .iter()
        .map(|p| format!("(?:{})", p))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&joined)
        .map(Some)
        .map_err(|source| RunError::InvalidFilter {
            pattern: patterns.join("|"),
            source,
        })
}

/// Build the execution plan for `namespace`
pub fn build_plan(
    namespace: &Namespace,
    prefix: &str,
    patterns: &[String],
) -> Result<ExecutionPlan, RunError> {
    let filter = compile_filters(patterns)?;

    let benchmarks = namespace
        .discover(prefix)
        .filter(|def| match &filter {
            Some(re) if !re.is_match(&def.name) => {
                tracing::debug!("filtering out {}", def.name);
                false
            }
            _ => true,
        })
        .map(PlannedBenchmark::resolve)
        .collect::<Vec<_>>();

    tracing::debug!(
        planned = benchmarks.len(),
        prefix,
        filters = ?patterns,
        "built execution plan"
    );

    Ok(ExecutionPlan { benchmarks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use microbench_core::{Sections, configure};

    fn def(name: &str) -> BenchmarkDef {
        BenchmarkDef::from_sections(name, Sections::new(|| (), |_| (), |_, _| {}))
    }

    fn namespace() -> Namespace {
        ["bench_a", "bench_b", "bench_c", "helper_a"]
            .into_iter()
            .map(def)
            .collect()
    }

    fn planned_names(plan: &ExecutionPlan) -> Vec<&str> {
        plan.benchmarks.iter().map(|b| b.name.as_str()).collect()
    }

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_filter_keeps_prefix_matches_in_order() {
        let plan = build_plan(&namespace(), "bench_", &[]).unwrap();
        assert_eq!(planned_names(&plan), ["bench_a", "bench_b", "bench_c"]);
    }

    #[test]
    fn test_filters_are_or_joined() {
        let plan = build_plan(&namespace(), "bench_", &patterns(&["_a$", "_c"])).unwrap();
        assert_eq!(planned_names(&plan), ["bench_a", "bench_c"]);
    }

    #[test]
    fn test_filter_matches_anywhere() {
        let plan = build_plan(&namespace(), "bench_", &patterns(&["ch_b"])).unwrap();
        assert_eq!(planned_names(&plan), ["bench_b"]);
    }

    #[test]
    fn test_filter_matching_nothing() {
        let plan = build_plan(&namespace(), "bench_", &patterns(&["zzz"])).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_alternation_inside_pattern_stays_grouped() {
        let plan = build_plan(&namespace(), "", &patterns(&["^bench_a|bench_b$", "^helper"])).unwrap();
        assert_eq!(planned_names(&plan), ["bench_a", "bench_b", "helper_a"]);
    }

    #[test]
    fn test_invalid_filter() {
        let err = build_plan(&namespace(), "bench_", &patterns(&["ok", "(unclosed"])).err();
        match err {
            Some(RunError::InvalidFilter { pattern, .. }) => assert_eq!(pattern, "ok|(unclosed"),
            other => panic!("expected InvalidFilter, got {:?}", other),
        }
    }

    #[test]
    fn test_resolution_uses_configuration() {
        let mut ns = namespace();
        ns.configure("bench_b", &configure().iterations(5).name("custom"))
            .unwrap();
        let plan = build_plan(&ns, "bench_", &[]).unwrap();

        let b = &plan.benchmarks[1];
        assert_eq!(b.iterations, 5);
        assert_eq!(b.display_name, "custom");
        assert_eq!(plan.benchmarks[0].iterations, microbench_core::DEFAULT_ITERATIONS);
        assert_eq!(plan.benchmarks[0].display_name, "bench_a");
    }
}
