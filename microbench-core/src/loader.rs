//! Loader
//!
//! Binds synthesized units into a name-addressable table. Worker processes
//! rebuild the table from scratch, so lookups by name behave the same in
//! every process.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::synth::SynthesizedUnit;

/// A loaded timing routine: `(loops) -> seconds`
pub type TimingFn = Arc<dyn Fn(u64) -> f64 + Send + Sync>;

/// Failure to bind a synthesized unit
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// A unit with the same name is already bound
    #[error("benchmark `{0}` is already loaded")]
    DuplicateName(String),

    /// Units must have a name to be looked up by
    #[error("cannot load a benchmark with an empty name")]
    EmptyName,
}

/// Name -> timing routine table, in load order
#[derive(Default, Clone)]
pub struct LoadedBenchmarks {
    entries: Vec<(String, TimingFn)>,
}

impl LoadedBenchmarks {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `unit` under its name and return the callable
    pub fn load(&mut self, unit: SynthesizedUnit) -> Result<TimingFn, LoadError> {
        if unit.name().is_empty() {
            return Err(LoadError::EmptyName);
        }
        if self.get(unit.name()).is_some() {
            return Err(LoadError::DuplicateName(unit.name().to_string()));
        }

        let name = unit.name().to_string();
        let timing: TimingFn = Arc::new(move |loops| unit.call(loops));
        self.entries.push((name, timing.clone()));
        Ok(timing)
    }

    /// Look up a bound routine by name
    pub fn get(&self, name: &str) -> Option<TimingFn> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.clone())
    }

    /// Names of all bound routines, in load order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of bound routines
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for LoadedBenchmarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Bind `unit` into `namespace`; see [`LoadedBenchmarks::load`].
pub fn load(unit: SynthesizedUnit, namespace: &mut LoadedBenchmarks) -> Result<TimingFn, LoadError> {
    let timing = namespace.load(unit)?;
    tracing::debug!(loaded = namespace.len(), "bound timing routine");
    Ok(timing)
}
