//! Analyzer configuration.
//!
//! Loaded from a JSON or YAML file (chosen by extension) and then overridden
//! by CLI flags. The value is passed explicitly to the batch runner and the
//! writers.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EnvironmentError};

pub const DEFAULT_OUTPUT_DIR: &str = "/var/log/postgres_cores";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const INSTALL_ROOT_ENV: &str = "GPHOME";

/// Encoding of saved documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }

    /// Format implied by a document path (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Some(OutputFormat::Json),
            Some("yaml") | Some("yml") => Some(OutputFormat::Yaml),
            _ => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Settings for one analyzer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub format: OutputFormat,
    pub output_dir: PathBuf,
    /// Newest cores to analyze; 0 means all.
    pub max_cores: usize,
    pub compare: bool,
    /// Print a condensed report instead of writing documents.
    pub gdb_style: bool,
    /// Worker-pool size, and so the number of concurrent debugger sessions.
    pub jobs: usize,
    /// Limit for each external command.
    pub timeout_secs: u64,
    /// Database installation root; `GPHOME` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_root: Option<PathBuf>,
    pub debugger: String,
    pub file_probe: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_cores: 0,
            compare: false,
            gdb_style: false,
            jobs: default_jobs(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            install_root: None,
            debugger: "gdb".to_string(),
            file_probe: "file".to_string(),
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// At least one worker, never more than there are files.
    pub fn worker_count(&self, files: usize) -> usize {
        self.jobs.max(1).min(files.max(1))
    }

    /// Explicit install root, else `GPHOME`.
    pub fn resolve_install_root(&self) -> Result<PathBuf, EnvironmentError> {
        if let Some(root) = &self.install_root {
            return Ok(root.clone());
        }
        match std::env::var_os(INSTALL_ROOT_ENV) {
            Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
            _ => Err(EnvironmentError::MissingInstallRoot),
        }
    }

    /// `<install root>/bin/postgres`.
    pub fn postgres_binary(install_root: &Path) -> PathBuf {
        install_root.join("bin").join("postgres")
    }
}

/// Reads a config document; YAML unless the extension says `.json`.
pub fn load_config(path: &Path) -> Result<AnalyzerConfig, ConfigError> {
    let body = fs::read_to_string(path)
        .map_err(|e| ConfigError::Read { path: path.to_path_buf(), reason: e.to_string() })?;
    let parse_err = |reason: String| ConfigError::Parse { path: path.to_path_buf(), reason };
    match OutputFormat::from_path(path) {
        Some(OutputFormat::Json) => {
            serde_json::from_str(&body).map_err(|e| parse_err(e.to_string()))
        }
        _ => serde_yaml::from_str(&body).map_err(|e| parse_err(e.to_string())),
    }
}
