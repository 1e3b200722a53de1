use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use corelens::commands::{analyze_command, compare_command, parse_command, AnalyzeOptions};
use corelens::init_logging;

/// Post-mortem crash analysis for database core dumps.
///
/// Thin wrapper around `corelens-core`: discovery, the debugger session,
/// transcript parsing and clustering all live in the library.
#[derive(Parser, Debug)]
#[command(
    name = "corelens",
    version,
    about = "Analyze core dumps from PostgreSQL-derived database clusters",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a core file, or every core file in a directory.
    ///
    /// Each successful analysis is saved to the output directory, or printed
    /// as a report with `--gdb-style`.
    Analyze {
        /// Core file or directory to scan.
        path: String,

        /// JSON or YAML config file; flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Document format: json or yaml.
        #[arg(long)]
        format: Option<String>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Keep only the N most recent core files (0 keeps all).
        #[arg(long)]
        max_cores: Option<usize>,

        /// Cluster the analyses into recurring crash patterns.
        #[arg(long)]
        compare: bool,

        /// Print condensed reports instead of saving documents.
        #[arg(long)]
        gdb_style: bool,

        /// Number of concurrent debugger sessions.
        #[arg(long)]
        jobs: Option<usize>,

        /// Per-command timeout in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Database installation root; defaults to $GPHOME.
        #[arg(long)]
        install_root: Option<PathBuf>,

        /// Debugger program.
        #[arg(long)]
        debugger: Option<String>,

        /// File-type probe program.
        #[arg(long)]
        file_probe: Option<String>,
    },

    /// Parse a saved debugger transcript without running any tools.
    Parse {
        #[arg(long)]
        transcript: PathBuf,

        /// Output line of the file-type probe for the same core.
        #[arg(long)]
        file_output: Option<String>,

        /// Core file name recorded in the document.
        #[arg(long)]
        core_file: Option<String>,

        #[arg(long, default_value = "yaml")]
        format: String,

        #[arg(long)]
        gdb_style: bool,
    },

    /// Cluster previously saved analysis documents.
    Compare {
        /// Two or more analysis documents (.json or .yaml).
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        #[arg(long, default_value = "yaml")]
        format: String,

        /// Save the comparison here instead of printing it.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        gdb_style: bool,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Analyze {
            path,
            config,
            format,
            output_dir,
            max_cores,
            compare,
            gdb_style,
            jobs,
            timeout_secs,
            install_root,
            debugger,
            file_probe,
        } => {
            let opts = AnalyzeOptions {
                config,
                format,
                output_dir,
                max_cores,
                compare,
                gdb_style,
                jobs,
                timeout_secs,
                install_root,
                debugger,
                file_probe,
            };
            analyze_command(&mut out, &path, &opts)?;
        }
        Command::Parse { transcript, file_output, core_file, format, gdb_style } => {
            parse_command(
                &mut out,
                &transcript,
                file_output.as_deref(),
                core_file.as_deref(),
                &format,
                gdb_style,
            )?;
        }
        Command::Compare { documents, format, output_dir, gdb_style } => {
            compare_command(&mut out, &documents, &format, output_dir.as_deref(), gdb_style)?;
        }
    }

    Ok(())
}
