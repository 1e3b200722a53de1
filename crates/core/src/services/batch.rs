//! Per-file pipeline and the bounded worker pool that runs it.
//!
//! Each worker pops core paths from a shared queue and runs the probes and
//! the assembler for one file at a time, so at most `jobs` debugger sessions
//! are alive at once. Results travel back over a channel; the comparison is
//! computed only after every worker has finished.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use crossbeam::channel;
use crossbeam::queue::ArrayQueue;
use serde::{Deserialize, Serialize};

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzeError, EnvironmentError};
use crate::model::{CoreAnalysis, CoreComparison, FileInfo};
use crate::services::assembler::{assemble, TranscriptInput};
use crate::services::cluster::compare_cores;
use crate::services::probe::{probe_binary_info, probe_file_type, run_debugger, CommandRunner};

/// One core file that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreFailure {
    pub core_file: PathBuf,
    pub error: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Successful analyses in discovery order.
    pub analyses: Vec<CoreAnalysis>,
    pub failures: Vec<CoreFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<CoreComparison>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.analyses.len()
    }
}

/// Coordinator that ties the configuration to a command runner.
pub struct Analyzer<'a> {
    pub config: &'a AnalyzerConfig,
    pub runner: &'a dyn CommandRunner,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a AnalyzerConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Full pipeline for one core file against the given database binary.
    pub fn analyze_core(&self, core: &Path, binary: &Path) -> Result<CoreAnalysis, AnalyzeError> {
        let meta = fs::metadata(core).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AnalyzeError::MissingCore(core.to_path_buf()),
            _ => AnalyzeError::UnreadableCore { path: core.to_path_buf(), reason: e.to_string() },
        })?;
        if !meta.is_file() {
            return Err(AnalyzeError::UnreadableCore {
                path: core.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }
        let created = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
            .unwrap_or_default();

        let timeout = self.config.timeout();
        let file_output = probe_file_type(self.runner, &self.config.file_probe, core, timeout)?;

        if !binary.is_file() {
            return Err(AnalyzeError::MissingBinary(binary.to_path_buf()));
        }
        let binary_info = probe_binary_info(self.runner, binary, timeout);
        let transcript = run_debugger(self.runner, &self.config.debugger, binary, core, timeout)?;

        let input = TranscriptInput {
            core_file: core.display().to_string(),
            transcript,
            file_info: FileInfo { file_output, size: meta.len(), created },
            binary_info,
            timestamp: None,
        };
        Ok(assemble(&input))
    }

    /// Analyzes `cores` on a pool of `jobs` workers. Per-file failures are
    /// collected; only a missing installation root aborts the run.
    pub fn run_batch(&self, cores: &[PathBuf]) -> Result<BatchReport, EnvironmentError> {
        let install_root = self.config.resolve_install_root()?;
        let binary = AnalyzerConfig::postgres_binary(&install_root);
        let mut report = BatchReport::default();
        if cores.is_empty() {
            return Ok(report);
        }

        let queue = ArrayQueue::new(cores.len());
        for job in cores.iter().cloned().enumerate() {
            let _ = queue.push(job);
        }
        let (tx, rx) = channel::unbounded();
        let workers = self.config.worker_count(cores.len());
        log::info!("analyzing {} core files with {workers} workers", cores.len());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let binary = binary.as_path();
                scope.spawn(move || {
                    while let Some((idx, core)) = queue.pop() {
                        log::info!("analyzing {}", core.display());
                        let result = self.analyze_core(&core, binary);
                        if tx.send((idx, core, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let mut results: Vec<_> = rx.into_iter().collect();
        results.sort_by_key(|(idx, _, _)| *idx);
        for (_, core, result) in results {
            match result {
                Ok(analysis) => report.analyses.push(analysis),
                Err(err) => {
                    log::warn!("failed to analyze {}: {err}", core.display());
                    report.failures.push(CoreFailure { core_file: core, error: err.to_string() });
                }
            }
        }

        if self.config.compare && report.analyses.len() > 1 {
            report.comparison = Some(compare_cores(&report.analyses));
        }
        Ok(report)
    }
}
