//! Document encoding and persistence.
//!
//! - `to_string` / `from_str` encode any model document as JSON or YAML.
//! - `write_analysis` / `write_comparison` save timestamped files in the
//!   output directory.
//! - `load_analysis` reads a saved analysis back, choosing the decoder by
//!   file extension.

pub mod report;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::{EnvironmentError, OutputError};
use crate::model::{CoreAnalysis, CoreComparison};
use crate::parser::primitives::basename;

pub const FILE_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

pub fn to_string<T: Serialize>(doc: &T, format: OutputFormat) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(doc)
            .map_err(|e| OutputError::Serialize { format: "json", reason: e.to_string() }),
        OutputFormat::Yaml => serde_yaml::to_string(doc)
            .map_err(|e| OutputError::Serialize { format: "yaml", reason: e.to_string() }),
    }
}

pub fn from_str<T: DeserializeOwned>(
    body: &str,
    format: OutputFormat,
    origin: &Path,
) -> Result<T, OutputError> {
    let err = |reason: String| OutputError::Deserialize { path: origin.to_path_buf(), reason };
    match format {
        OutputFormat::Json => serde_json::from_str(body).map_err(|e| err(e.to_string())),
        OutputFormat::Yaml => serde_yaml::from_str(body).map_err(|e| err(e.to_string())),
    }
}

/// Creates the output directory; failure is fatal for the run.
pub fn ensure_output_dir(dir: &Path) -> Result<(), EnvironmentError> {
    fs::create_dir_all(dir)
        .map_err(|e| EnvironmentError::OutputDir { path: dir.to_path_buf(), reason: e.to_string() })
}

/// `core_analysis_<YYYYmmdd_HHMMSS>_<core name>.<ext>`
pub fn analysis_file_name(core_file: &str, at: DateTime<Local>, format: OutputFormat) -> String {
    format!(
        "core_analysis_{}_{}.{}",
        at.format(FILE_TIMESTAMP),
        basename(core_file),
        format.extension()
    )
}

/// `core_comparison_<YYYYmmdd_HHMMSS>.<ext>`
pub fn comparison_file_name(at: DateTime<Local>, format: OutputFormat) -> String {
    format!("core_comparison_{}.{}", at.format(FILE_TIMESTAMP), format.extension())
}

fn write_document<T: Serialize>(
    doc: &T,
    path: PathBuf,
    format: OutputFormat,
) -> Result<PathBuf, OutputError> {
    let body = to_string(doc, format)?;
    fs::write(&path, body).map_err(|source| OutputError::Write { path: path.clone(), source })?;
    Ok(path)
}

pub fn write_analysis(
    analysis: &CoreAnalysis,
    dir: &Path,
    format: OutputFormat,
) -> Result<PathBuf, OutputError> {
    let name = analysis_file_name(&analysis.core_file, Local::now(), format);
    write_document(analysis, dir.join(name), format)
}

pub fn write_comparison(
    comparison: &CoreComparison,
    dir: &Path,
    format: OutputFormat,
) -> Result<PathBuf, OutputError> {
    let name = comparison_file_name(Local::now(), format);
    write_document(comparison, dir.join(name), format)
}

/// Reads a saved analysis; `.json` is JSON, anything else YAML.
pub fn load_analysis(path: &Path) -> Result<CoreAnalysis, OutputError> {
    let body = fs::read_to_string(path)
        .map_err(|source| OutputError::Read { path: path.to_path_buf(), source })?;
    let format = OutputFormat::from_path(path).unwrap_or(OutputFormat::Yaml);
    from_str(&body, format, path)
}
