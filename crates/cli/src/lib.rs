//! Library surface of the `corelens` CLI.
//!
//! The subcommands live in `commands` so they can be driven from tests with a
//! scripted command runner and an in-memory writer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use corelens_core::config::{load_config, AnalyzerConfig};

pub mod commands;

/// Installs the stderr logger with an `info` default; `RUST_LOG` overrides it.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Reads an optional config file, falling back to defaults when none is given.
pub fn load_config_or_default(path: Option<&Path>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AnalyzerConfig::default()),
    }
}

/// Output directory for a run: the flag if given, else the configured one.
pub fn output_dir_or(flag: Option<PathBuf>, configured: &Path) -> PathBuf {
    flag.unwrap_or_else(|| configured.to_path_buf())
}
