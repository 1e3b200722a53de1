use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use corelens_core::config::OutputFormat;
use corelens_core::output::report::render_analysis;
use corelens_core::output::to_string;
use corelens_core::services::{assemble, TranscriptInput};

/// Runs the parsing pipeline over a saved debugger transcript.
///
/// `file_output` is the file-type probe line for the same core, if it was
/// captured; without it the process fields stay empty.
pub fn parse_command<W: Write>(
    out: &mut W,
    transcript: &Path,
    file_output: Option<&str>,
    core_file: Option<&str>,
    format: &str,
    gdb_style: bool,
) -> Result<()> {
    let format = OutputFormat::from_str(format)?;
    let text = fs::read_to_string(transcript)
        .with_context(|| format!("Failed to read transcript {}", transcript.display()))?;

    let core = core_file.map(str::to_string).unwrap_or_else(|| transcript.display().to_string());
    let mut input = TranscriptInput::new(core, text);
    if let Some(line) = file_output {
        input.file_info.file_output = line.trim().to_string();
    }
    let analysis = assemble(&input);

    if gdb_style {
        render_analysis(out, &analysis)?;
    } else {
        let body = to_string(&analysis, format)?;
        out.write_all(body.as_bytes())?;
        if !body.ends_with('\n') {
            writeln!(out)?;
        }
    }
    Ok(())
}
