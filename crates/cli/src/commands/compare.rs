use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use corelens_core::config::OutputFormat;
use corelens_core::output::report::render_comparison;
use corelens_core::output::{ensure_output_dir, load_analysis, to_string, write_comparison};
use corelens_core::services::compare_cores;

/// Clusters previously saved analysis documents.
///
/// With `output_dir` the comparison is saved there; otherwise it is printed,
/// as a report when `gdb_style` is set.
pub fn compare_command<W: Write>(
    out: &mut W,
    documents: &[PathBuf],
    format: &str,
    output_dir: Option<&Path>,
    gdb_style: bool,
) -> Result<()> {
    let format = OutputFormat::from_str(format)?;
    if documents.len() < 2 {
        bail!("compare needs at least two analysis documents, got {}", documents.len());
    }

    let analyses = documents
        .iter()
        .map(|doc| {
            load_analysis(doc).with_context(|| format!("Failed to load analysis {}", doc.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let comparison = compare_cores(&analyses);

    if let Some(dir) = output_dir {
        ensure_output_dir(dir)?;
        let saved = write_comparison(&comparison, dir, format)?;
        writeln!(out, "Comparison saved to {}", saved.display())?;
    } else if gdb_style {
        render_comparison(out, &comparison)?;
    } else {
        out.write_all(to_string(&comparison, format)?.as_bytes())?;
    }
    Ok(())
}
