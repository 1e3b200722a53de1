//! External command seam and the probes built on it.
//!
//! Every subprocess (the file-type probe, the binary version probes and the
//! gdb batch session) goes through `CommandRunner`, so tests can script the
//! outputs and the real runner can enforce a per-invocation timeout.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ProbeError;
use crate::model::BinaryInfo;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of one finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout followed by stderr, the way gdb transcripts are consumed.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}{}", self.stdout, self.stderr)
        }
    }

    fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "signal".to_string(),
        }
    }
}

/// Runs an external program to completion or until `timeout` expires.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ProbeError>;
}

/// `CommandRunner` backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ProbeError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        // Drain both pipes on their own threads so a chatty child never blocks.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_timeout(&mut child, timeout).map_err(|e| spawn_error(program, e))?;
        let Some(status) = status else {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("{program} exceeded {}s and was killed", timeout.as_secs());
            return Err(ProbeError::TimedOut { program: program.to_string(), timeout });
        };

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> ProbeError {
    ProbeError::Spawn { program: program.to_string(), reason: err.to_string() }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Runs a command and requires a zero exit status.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, ProbeError> {
    let output = runner.run(program, args, timeout)?;
    if !output.success {
        return Err(ProbeError::Failed {
            program: program.to_string(),
            status: output.status_text(),
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Single-line file-type classification of a core file.
pub fn probe_file_type(
    runner: &dyn CommandRunner,
    file_probe: &str,
    core: &Path,
    timeout: Duration,
) -> Result<String, ProbeError> {
    let args = vec![core.display().to_string()];
    let output = run_checked(runner, file_probe, &args, timeout)?;
    Ok(output.stdout.trim().to_string())
}

/// Version and build facts of the database binary. Each probe is optional:
/// a failure is logged and leaves its field empty.
pub fn probe_binary_info(
    runner: &dyn CommandRunner,
    binary: &Path,
    timeout: Duration,
) -> BinaryInfo {
    let program = binary.display().to_string();
    let optional = |program: &str, arg: &str| -> Option<String> {
        match run_checked(runner, program, &[arg.to_string()], timeout) {
            Ok(output) => Some(output.stdout.trim().to_string()),
            Err(err) => {
                log::warn!("skipping {program} {arg}: {err}");
                None
            }
        }
    };

    let pg_config = binary.with_file_name("pg_config").display().to_string();
    BinaryInfo {
        binary_path: program.clone(),
        version: optional(&program, "--version").unwrap_or_default(),
        gp_version: optional(&program, "--gp-version").unwrap_or_default(),
        build_options: optional(&pg_config, "--configure")
            .map(|out| parse_build_options(&out))
            .unwrap_or_default(),
    }
}

/// `'--prefix=/usr/local' '--with-perl'` -> `["--prefix=/usr/local", "--with-perl"]`.
pub fn parse_build_options(output: &str) -> Vec<String> {
    output
        .split_whitespace()
        .map(|opt| opt.trim_matches('\'').to_string())
        .filter(|opt| !opt.is_empty())
        .collect()
}

/// The fixed gdb command script. `source_dir` is prepended as a
/// `directory` command when given.
pub fn gdb_commands(source_dir: Option<&Path>) -> Vec<String> {
    let mut commands = Vec::new();
    if let Some(dir) = source_dir {
        commands.push(format!("directory {}", dir.display()));
    }
    commands.extend(
        [
            "set pagination off",
            "set print pretty on",
            "set print object on",
            "info threads",
            "thread apply all bt full",
            "info registers all",
            "info signal SIGABRT",
            "info signal SIGSEGV",
            "info signal SIGBUS",
            "print $_siginfo",
            "info sharedlibrary",
            "x/1i $pc",
            "info proc mappings",
            "thread apply all print $_thread",
            "print $_siginfo._sifields._sigfault",
            "info frame",
            "info locals",
            "bt full",
            "quit",
        ]
        .iter()
        .map(|cmd| cmd.to_string()),
    );
    commands
}

/// Full gdb argument list: `-nx --batch -ex <cmd>... <binary> <core>`.
pub fn gdb_args(binary: &Path, core: &Path) -> Vec<String> {
    let source_dir = binary.parent().and_then(|bin| bin.parent()).map(|root| root.join("src"));
    let source_dir = source_dir.filter(|dir| dir.is_dir());

    let mut args = vec!["-nx".to_string(), "--batch".to_string()];
    for cmd in gdb_commands(source_dir.as_deref()) {
        args.push("-ex".to_string());
        args.push(cmd);
    }
    args.push(binary.display().to_string());
    args.push(core.display().to_string());
    args
}

/// Runs the batch session and returns its combined output.
pub fn run_debugger(
    runner: &dyn CommandRunner,
    debugger: &str,
    binary: &Path,
    core: &Path,
    timeout: Duration,
) -> Result<String, ProbeError> {
    let output = run_checked(runner, debugger, &gdb_args(binary, core), timeout)?;
    Ok(output.combined())
}
