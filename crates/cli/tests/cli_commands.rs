use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/segv_transcript.txt"))
}

/// Saves the parsed fixture as a JSON analysis named after `core`.
fn save_analysis(dir: &Path, core: &str) -> std::path::PathBuf {
    let output = cargo_bin_cmd!("corelens")
        .arg("parse")
        .arg("--transcript")
        .arg(fixture())
        .arg("--core-file")
        .arg(core)
        .arg("--format")
        .arg("json")
        .output()
        .expect("run parse");
    assert!(output.status.success(), "parse failed: {}", String::from_utf8_lossy(&output.stderr));
    let path = dir.join(format!("{core}.json"));
    fs::write(&path, &output.stdout).expect("write analysis");
    path
}

#[test]
fn help_lists_subcommands() {
    cargo_bin_cmd!("corelens")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("compare"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    cargo_bin_cmd!("corelens").assert().failure();
}

#[test]
fn parse_emits_json_document() {
    let output = cargo_bin_cmd!("corelens")
        .arg("parse")
        .arg("--transcript")
        .arg(fixture())
        .arg("--core-file")
        .arg("/cores/core.12345")
        .arg("--format")
        .arg("json")
        .output()
        .expect("run parse");
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(doc["core_file"], "/cores/core.12345");
    assert_eq!(doc["signal_info"]["signal_name"], "SIGSEGV");
    assert_eq!(doc["signal_info"]["signal_number"], 11);
    assert_eq!(doc["threads"].as_array().map(Vec::len), Some(2));
}

#[test]
fn parse_defaults_to_yaml() {
    cargo_bin_cmd!("corelens")
        .arg("parse")
        .arg("--transcript")
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("signal_name: SIGSEGV"));
}

#[test]
fn parse_gdb_style_prints_report() {
    cargo_bin_cmd!("corelens")
        .arg("parse")
        .arg("--transcript")
        .arg(fixture())
        .arg("--gdb-style")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database Core Analysis"))
        .stdout(predicate::str::contains("Program received signal SIGSEGV (11)"))
        .stdout(predicate::str::contains("(Crashed)"));
}

#[test]
fn parse_rejects_unknown_format() {
    cargo_bin_cmd!("corelens")
        .arg("parse")
        .arg("--transcript")
        .arg(fixture())
        .arg("--format")
        .arg("xml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid format: xml"));
}

#[test]
fn parse_reports_missing_transcript() {
    let dir = tempdir().expect("tempdir");
    cargo_bin_cmd!("corelens")
        .arg("parse")
        .arg("--transcript")
        .arg(dir.path().join("absent.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read transcript"));
}

#[test]
fn compare_prints_recurring_pattern() {
    let dir = tempdir().expect("tempdir");
    let first = save_analysis(dir.path(), "core.1");
    let second = save_analysis(dir.path(), "core.2");

    cargo_bin_cmd!("corelens")
        .arg("compare")
        .arg(&first)
        .arg(&second)
        .arg("--gdb-style")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total cores: 2"))
        .stdout(predicate::str::contains("SIGSEGV: 2"))
        .stdout(predicate::str::contains("SIGSEGV x2"));
}

#[test]
fn compare_saves_to_output_dir() {
    let dir = tempdir().expect("tempdir");
    let first = save_analysis(dir.path(), "core.1");
    let second = save_analysis(dir.path(), "core.2");
    let out = dir.path().join("reports");

    cargo_bin_cmd!("corelens")
        .arg("compare")
        .arg(&first)
        .arg(&second)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Comparison saved to"));

    let saved: Vec<_> = fs::read_dir(&out)
        .expect("read output dir")
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].starts_with("core_comparison_"));
    assert!(saved[0].ends_with(".yaml"));
}

#[test]
fn compare_needs_two_documents() {
    let dir = tempdir().expect("tempdir");
    let only = save_analysis(dir.path(), "core.1");

    cargo_bin_cmd!("corelens")
        .arg("compare")
        .arg(&only)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least two analysis documents"));
}

#[test]
fn analyze_reports_missing_path() {
    let dir = tempdir().expect("tempdir");
    cargo_bin_cmd!("corelens")
        .arg("analyze")
        .arg(dir.path().join("nowhere"))
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No core files found"));
}
