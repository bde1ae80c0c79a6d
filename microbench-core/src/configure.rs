//! Configuration Attachment
//!
//! Builder for the two per-benchmark overrides. Applying a [`Configure`]
//! stamps `iterations` / `display_name` on a definition and leaves everything
//! else (including its kernel) untouched.

use thiserror::Error;

use crate::BenchmarkDef;

/// Invalid configuration for a specific benchmark
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Unroll counts must be positive
    #[error("benchmark `{name}`: iterations must be positive")]
    ZeroIterations {
        /// Benchmark the configuration was applied to
        name: String,
    },

    /// No benchmark with this name in the namespace
    #[error("no benchmark named `{0}` to configure")]
    UnknownBenchmark(String),
}

/// Per-benchmark overrides; unset fields leave the definition as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configure {
    iterations: Option<u64>,
    name: Option<String>,
}

/// Start an empty configuration
///
/// ```
/// use microbench_core::{BenchmarkDef, Sections, configure};
///
/// let def = BenchmarkDef::from_sections("bench_add", Sections::new(|| 1, |x| *x + 1, |_, _| {}));
/// let def = configure().iterations(5).name("add").apply(def).unwrap();
/// assert_eq!(def.resolved_iterations(), 5);
/// assert_eq!(def.resolved_name(), "add");
/// ```
pub fn configure() -> Configure {
    Configure::default()
}

impl Configure {
    /// Override the bench repetitions per loop pass
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Override the reporting name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stamp the overrides on `def` in place
    pub fn apply_to(&self, def: &mut BenchmarkDef) -> Result<(), ConfigError> {
        if self.iterations == Some(0) {
            return Err(ConfigError::ZeroIterations {
                name: def.name.clone(),
            });
        }
        if let Some(iterations) = self.iterations {
            def.iterations = Some(iterations);
        }
        if let Some(name) = &self.name {
            def.display_name = Some(name.clone());
        }
        Ok(())
    }

    /// Stamp the overrides and hand the definition back
    pub fn apply(&self, mut def: BenchmarkDef) -> Result<BenchmarkDef, ConfigError> {
        self.apply_to(&mut def)?;
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_ITERATIONS, Sections};

    fn def() -> BenchmarkDef {
        BenchmarkDef::from_sections("bench_cfg", Sections::new(|| 1_u8, |x| *x, |_, _| {}))
    }

    #[test]
    fn test_empty_configure_is_identity() {
        let def = configure().apply(def()).unwrap();
        assert_eq!(def.iterations, None);
        assert_eq!(def.display_name, None);
        assert_eq!(def.resolved_iterations(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_overrides_applied() {
        let def = configure().iterations(5).name("custom").apply(def()).unwrap();
        assert_eq!(def.resolved_iterations(), 5);
        assert_eq!(def.resolved_name(), "custom");
        assert_eq!(def.name, "bench_cfg");
    }

    #[test]
    fn test_last_write_wins_per_field() {
        let def = configure().iterations(5).name("first").apply(def()).unwrap();
        let def = configure().iterations(9).apply(def).unwrap();
        let def = configure().name("second").apply(def).unwrap();

        assert_eq!(def.resolved_iterations(), 9);
        assert_eq!(def.resolved_name(), "second");
    }

    #[test]
    fn test_configured_def_still_invocable() {
        let def = configure().iterations(3).apply(def()).unwrap();
        assert!(def.invoke() >= 0.0);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = configure().iterations(0).apply(def()).err();
        assert_eq!(
            err,
            Some(ConfigError::ZeroIterations {
                name: "bench_cfg".to_string()
            })
        );
    }
}
