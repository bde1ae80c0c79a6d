//! Namespace
//!
//! Ordered collection of benchmark definitions keyed by name. Order is
//! insertion order for programmatic namespaces and source order for the
//! benchmarks registered with `#[bench]`, so discovery is deterministic.

use crate::configure::{ConfigError, Configure};
use crate::{BenchmarkDef, StaticBenchmark};

/// Ordered name -> definition mapping
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Vec<BenchmarkDef>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace of every benchmark registered via `#[bench]` in this binary,
    /// ordered by definition site.
    pub fn collect() -> Self {
        let mut statics: Vec<&StaticBenchmark> = inventory::iter::<StaticBenchmark>.into_iter().collect();
        statics.sort_by(|a, b| (a.file, a.line, a.name).cmp(&(b.file, b.line, b.name)));

        let mut namespace = Self::new();
        for bench in statics {
            namespace.insert(BenchmarkDef::from(bench));
        }
        namespace
    }

    /// Add a definition; a definition with the same name is replaced in place.
    pub fn insert(&mut self, def: BenchmarkDef) {
        match self.entries.iter_mut().find(|d| d.name == def.name) {
            Some(slot) => *slot = def,
            None => self.entries.push(def),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, def: BenchmarkDef) -> Self {
        self.insert(def);
        self
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Option<&BenchmarkDef> {
        self.entries.iter().find(|d| d.name == name)
    }

    /// Apply `config` to the named definition
    pub fn configure(&mut self, name: &str, config: &Configure) -> Result<(), ConfigError> {
        let def = self
            .entries
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| ConfigError::UnknownBenchmark(name.to_string()))?;
        config.apply_to(def)
    }

    /// Definitions whose name starts with `prefix`, in namespace order
    pub fn discover<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a BenchmarkDef> + 'a {
        self.entries.iter().filter(move |d| d.name.starts_with(prefix))
    }

    /// All definitions in order
    pub fn iter(&self) -> impl Iterator<Item = &BenchmarkDef> {
        self.entries.iter()
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the namespace is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<BenchmarkDef> for Namespace {
    fn from_iter<It: IntoIterator<Item = BenchmarkDef>>(iter: It) -> Self {
        let mut namespace = Self::new();
        namespace.extend(iter);
        namespace
    }
}

impl Extend<BenchmarkDef> for Namespace {
    fn extend<It: IntoIterator<Item = BenchmarkDef>>(&mut self, iter: It) {
        for def in iter {
            self.insert(def);
        }
    }
}
