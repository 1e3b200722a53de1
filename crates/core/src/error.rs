use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of a single external command invocation.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("{program} exited with {status}: {stderr}")]
    Failed { program: String, status: String, stderr: String },
    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

/// Per-file failures. The batch logs these and moves on to the next core.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Core file not found at {0}")]
    MissingCore(PathBuf),
    #[error("Failed to read core file {path}: {reason}")]
    UnreadableCore { path: PathBuf, reason: String },
    #[error("Database binary not found at {0}")]
    MissingBinary(PathBuf),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Problems with the environment that make the whole run impossible.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("installation root is not configured; set GPHOME or pass an install root")]
    MissingInstallRoot,
    #[error("Failed to create output directory {path}: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("No core files found at {0}")]
    NoCores(PathBuf),
}

/// Failures while rendering or persisting a document.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize document as {format}: {reason}")]
    Serialize { format: &'static str, reason: String },
    #[error("Failed to parse document {path}: {reason}")]
    Deserialize { path: PathBuf, reason: String },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid format: {0}. Valid options are 'json' or 'yaml'")]
    InvalidFormat(String),
    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}
