//! Configuration loading from microbench.toml
//!
//! Settings can be stored in a `microbench.toml` next to the benchmark crate.
//! The file is discovered by walking up from the current directory; command
//! line flags override it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up by [`MicrobenchConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "microbench.toml";

/// microbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MicrobenchConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Measurement settings; unset fields fall back to the built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Worker processes per benchmark
    #[serde(default)]
    pub processes: Option<usize>,
    /// Timed values per process
    #[serde(default)]
    pub values: Option<usize>,
    /// Warmup values per process
    #[serde(default)]
    pub warmups: Option<usize>,
    /// Fixed outer loop count (0 = calibrate)
    #[serde(default)]
    pub loops: Option<u64>,
    /// Calibration target per value (e.g., "100ms")
    #[serde(default)]
    pub min_time: Option<String>,
    /// Run benchmarks inside the supervisor process
    #[serde(default)]
    pub in_process: bool,
    /// Pin workers to this CPU (Linux only)
    #[serde(default)]
    pub pin_cpu: Option<usize>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// Directory relative `--output` paths are resolved against
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            directory: None,
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl MicrobenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let dir = std::env::current_dir().ok()?;
        Self::discover_from(dir)
    }

    /// Walk up from `dir` looking for `microbench.toml`
    pub fn discover_from(dir: impl Into<PathBuf>) -> Option<Self> {
        let mut dir = dir.into();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Resolve a report path against `[output] directory`
    pub fn output_path(&self, path: &Path) -> PathBuf {
        match &self.output.directory {
            Some(dir) if path.is_relative() => Path::new(dir).join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# microbench configuration

[runner]
# Worker processes per benchmark
processes = 20
# Timed values per process
values = 3
# Warmup values per process (reported, not summarized)
warmups = 1
# Outer loop count; 0 calibrates until one value takes min_time
loops = 0
min_time = "100ms"
# Run benchmarks inside the supervisor process
in_process = false
# Pin workers to a CPU (uncomment to enable)
# pin_cpu = 2

[output]
# Default output format: human, json
format = "human"
# Directory relative --output paths are written to (uncomment to enable)
# directory = "target/microbench"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "100ms", "1s", "2m")
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let multiplier: f64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" | "sec" => 1.0,
            "m" | "min" => 60.0,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_secs_f64(value * multiplier))
    }
}
