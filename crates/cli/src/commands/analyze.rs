use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use corelens_core::config::{AnalyzerConfig, OutputFormat};
use corelens_core::error::EnvironmentError;
use corelens_core::output::report::{render_analysis, render_comparison};
use corelens_core::output::{ensure_output_dir, write_analysis, write_comparison};
use corelens_core::services::{
    find_core_files, Analyzer, BatchReport, CommandRunner, CoreFailure, SystemRunner,
};

use crate::{load_config_or_default, output_dir_or};

/// Flag values for `analyze`. `None` and `false` leave the config value alone.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub config: Option<PathBuf>,
    pub format: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_cores: Option<usize>,
    pub compare: bool,
    pub gdb_style: bool,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub install_root: Option<PathBuf>,
    pub debugger: Option<String>,
    pub file_probe: Option<String>,
}

/// Config file values overridden by flags.
pub fn resolve_config(opts: &AnalyzeOptions) -> Result<AnalyzerConfig> {
    let mut config = load_config_or_default(opts.config.as_deref())?;
    if let Some(format) = &opts.format {
        config.format = OutputFormat::from_str(format)?;
    }
    config.output_dir = output_dir_or(opts.output_dir.clone(), &config.output_dir);
    if let Some(max) = opts.max_cores {
        config.max_cores = max;
    }
    config.compare |= opts.compare;
    config.gdb_style |= opts.gdb_style;
    if let Some(jobs) = opts.jobs {
        config.jobs = jobs;
    }
    if let Some(secs) = opts.timeout_secs {
        config.timeout_secs = secs;
    }
    if let Some(root) = &opts.install_root {
        config.install_root = Some(root.clone());
    }
    if let Some(debugger) = &opts.debugger {
        config.debugger = debugger.clone();
    }
    if let Some(probe) = &opts.file_probe {
        config.file_probe = probe.clone();
    }
    Ok(config)
}

/// `analyze` with the real process runner; the failure summary goes to stderr.
pub fn analyze_command<W: Write>(out: &mut W, path: &str, opts: &AnalyzeOptions) -> Result<()> {
    let config = resolve_config(opts)?;
    analyze_with_runner(out, &mut io::stderr(), Path::new(path), &config, &SystemRunner)
}

/// Documents that were analyzed but could not be written.
#[derive(Debug, Default)]
struct OutputFailures {
    analyses: Vec<CoreFailure>,
    comparison: Option<String>,
}

/// Discovers cores under `path`, analyzes them and writes or prints the
/// results. Per-file analysis and write failures are summarized on `summary`.
///
/// Fails only on environment errors or when no core file was both analyzed
/// and emitted.
pub fn analyze_with_runner<W: Write, E: Write>(
    out: &mut W,
    summary: &mut E,
    path: &Path,
    config: &AnalyzerConfig,
    runner: &dyn CommandRunner,
) -> Result<()> {
    if !config.gdb_style {
        ensure_output_dir(&config.output_dir)?;
    }
    let cores = find_core_files(path, config.max_cores)?;
    if cores.is_empty() {
        return Err(EnvironmentError::NoCores(path.to_path_buf()).into());
    }

    let report = Analyzer::new(config, runner).run_batch(&cores)?;
    let unsaved = emit_report(out, &report, config)?;

    let failed = report.failures.len() + unsaved.analyses.len();
    if failed > 0 {
        writeln!(summary, "Failed to analyze {failed} of {} core files:", cores.len())?;
        for failure in report.failures.iter().chain(&unsaved.analyses) {
            writeln!(summary, "  {}: {}", failure.core_file.display(), failure.error)?;
        }
    }
    if let Some(err) = &unsaved.comparison {
        writeln!(summary, "Failed to save comparison: {err}")?;
    }
    if report.succeeded() == unsaved.analyses.len() {
        bail!("none of the {} core files could be analyzed", cores.len());
    }
    Ok(())
}

fn emit_report<W: Write>(
    out: &mut W,
    report: &BatchReport,
    config: &AnalyzerConfig,
) -> Result<OutputFailures> {
    let mut unsaved = OutputFailures::default();
    for analysis in &report.analyses {
        if config.gdb_style {
            render_analysis(out, analysis)
                .with_context(|| format!("Failed to render report for {}", analysis.core_file))?;
            writeln!(out)?;
            continue;
        }
        // A failed write only loses this document; the rest are still saved.
        match write_analysis(analysis, &config.output_dir, config.format) {
            Ok(saved) => writeln!(out, "Analysis saved to {}", saved.display())?,
            Err(err) => {
                log::error!("{}: {err}", analysis.core_file);
                unsaved.analyses.push(CoreFailure {
                    core_file: PathBuf::from(&analysis.core_file),
                    error: err.to_string(),
                });
            }
        }
    }

    let Some(comparison) = &report.comparison else {
        return Ok(unsaved);
    };
    if config.gdb_style {
        render_comparison(out, comparison).context("Failed to render comparison")?;
    } else {
        match write_comparison(comparison, &config.output_dir, config.format) {
            Ok(saved) => writeln!(out, "Comparison saved to {}", saved.display())?,
            Err(err) => {
                log::error!("comparison: {err}");
                unsaved.comparison = Some(err.to_string());
            }
        }
    }
    Ok(unsaved)
}
