//! Core file discovery under a file or directory path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::EnvironmentError;

/// Core file naming conventions: `core`, `core.*`, `*.core`, `core-*`.
pub fn is_core_name(name: &str) -> bool {
    name == "core"
        || name.starts_with("core.")
        || name.ends_with(".core")
        || name.starts_with("core-")
}

/// Core files under `path`, newest first.
///
/// A file is returned as-is. A directory is scanned together with its
/// immediate sub-directories. `max_cores` of 0 keeps everything.
pub fn find_core_files(path: &Path, max_cores: usize) -> Result<Vec<PathBuf>, EnvironmentError> {
    let meta = fs::metadata(path).map_err(|_| EnvironmentError::NoCores(path.to_path_buf()))?;
    if !meta.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    collect_cores(path, true, &mut found);
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut cores: Vec<PathBuf> = found.into_iter().map(|(_, p)| p).collect();
    if max_cores > 0 && cores.len() > max_cores {
        log::info!("limiting analysis to the {max_cores} most recent core files");
        cores.truncate(max_cores);
    }
    Ok(cores)
}

fn collect_cores(dir: &Path, descend: bool, found: &mut Vec<(SystemTime, PathBuf)>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("cannot read {}: {err}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            if descend {
                collect_cores(&path, false, found);
            }
            continue;
        }
        let name = entry.file_name();
        if meta.is_file() && is_core_name(&name.to_string_lossy()) {
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, path));
        }
    }
}
