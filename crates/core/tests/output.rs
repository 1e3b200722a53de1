use std::fs;

use chrono::{Local, TimeZone};
use corelens_core::config::OutputFormat;
use corelens_core::model::{BasicInfo, CoreAnalysis, CoreComparison, StackFrame};
use corelens_core::output::report::{
    crash_context, format_frame, process_details, render_analysis, render_comparison,
};
use corelens_core::output::{
    analysis_file_name, comparison_file_name, from_str, load_analysis, to_string, write_analysis,
    write_comparison,
};
use corelens_core::parser::frames::SIGNAL_HANDLER_FRAME;
use corelens_core::services::{assemble, compare_cores, TranscriptInput};
use tempfile::tempdir;

const FIXTURE: &str = include_str!("fixtures/segv_transcript.txt");

fn fixture_analysis() -> CoreAnalysis {
    let mut input = TranscriptInput::new("/data/cores/core.12345", FIXTURE);
    input.file_info.file_output =
        "core: ELF 64-bit LSB core file, from 'postgres:  6000, gpadmin tpch 10.0.0.5(4711) con12 seg0 primary'"
            .to_string();
    input.file_info.created = "2024-03-01T10:20:30+00:00".to_string();
    input.file_info.size = 2048;
    input.binary_info.version = "postgres (Greenplum Database) 12.12".to_string();
    input.binary_info.build_options = vec!["--with-perl".to_string()];
    input.timestamp = Some("2024-03-01T11:00:00+00:00".to_string());
    assemble(&input)
}

#[test]
fn analysis_round_trips_through_json_and_yaml() {
    let analysis = fixture_analysis();
    for format in [OutputFormat::Json, OutputFormat::Yaml] {
        let body = to_string(&analysis, format).expect("serialize");
        let back: CoreAnalysis =
            from_str(&body, format, std::path::Path::new("memory")).expect("deserialize");
        assert_eq!(back, analysis, "round trip through {format}");
    }
}

#[test]
fn comparison_round_trips_through_json_and_yaml() {
    let one = fixture_analysis();
    let mut two = fixture_analysis();
    two.core_file = "/data/cores/core.999".to_string();
    let comparison = compare_cores(&[one, two]);
    assert_eq!(comparison.crash_patterns.len(), 1);
    for format in [OutputFormat::Json, OutputFormat::Yaml] {
        let body = to_string(&comparison, format).expect("serialize");
        let back: CoreComparison =
            from_str(&body, format, std::path::Path::new("memory")).expect("deserialize");
        assert_eq!(back, comparison);
    }
}

#[test]
fn json_uses_document_field_names() {
    let body = to_string(&fixture_analysis(), OutputFormat::Json).expect("serialize");
    let value: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert!(value.get("shared_libraries").is_some());
    assert!(value.get("postgres_info").is_some());
    assert_eq!(value["shared_libraries"][0]["type"], "System");
    assert_eq!(value["stack_trace"][0]["args"], "");
}

#[test]
fn malformed_documents_report_their_origin() {
    let err = from_str::<CoreAnalysis>("{not json", OutputFormat::Json, std::path::Path::new("bad.json"))
        .expect_err("should fail");
    assert!(err.to_string().contains("bad.json"), "{err}");
}

#[test]
fn document_file_names() {
    let at = Local.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).single().expect("local time");
    assert_eq!(
        analysis_file_name("/data/cores/core.1234", at, OutputFormat::Json),
        "core_analysis_20240301_102030_core.1234.json"
    );
    assert_eq!(comparison_file_name(at, OutputFormat::Yaml), "core_comparison_20240301_102030.yaml");
}

#[test]
fn written_documents_load_back() {
    let dir = tempdir().expect("tempdir");
    let analysis = fixture_analysis();

    let yaml = write_analysis(&analysis, dir.path(), OutputFormat::Yaml).expect("write yaml");
    assert!(yaml.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("core_analysis_")));
    assert_eq!(yaml.extension().and_then(|e| e.to_str()), Some("yaml"));
    assert_eq!(load_analysis(&yaml).expect("load yaml"), analysis);

    let json = write_analysis(&analysis, dir.path(), OutputFormat::Json).expect("write json");
    assert_eq!(load_analysis(&json).expect("load json"), analysis);

    let comparison = compare_cores(&[analysis.clone(), analysis]);
    let written = write_comparison(&comparison, dir.path(), OutputFormat::Json).expect("write");
    let body = fs::read_to_string(written).expect("read comparison");
    assert!(body.contains("\"crash_patterns\""));
}

#[test]
fn write_into_missing_directory_fails() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("nope");
    let err = write_analysis(&fixture_analysis(), &missing, OutputFormat::Json).expect_err("fails");
    assert!(err.to_string().contains("Failed to write"), "{err}");
}

#[test]
fn human_report_layout() {
    let analysis = fixture_analysis();
    let mut out = Vec::new();
    render_analysis(&mut out, &analysis).expect("render");
    let text = String::from_utf8(out).expect("utf8");

    assert!(text.starts_with("Database Core Analysis\n"));
    assert!(text.contains("PostgreSQL: postgres (Greenplum Database) 12.12"));
    assert!(text.contains("Program received signal SIGSEGV (11), Segmentation fault - SEGV_MAPERR"));
    assert!(text.contains("Fault address: 0x0000000000b1e2f8"));
    assert!(text.contains("Thread 1 [LWP 12345] (Signal Handler (Query: 0x55d0c2000000)) (Crashed):"));

    let crashed = text.find("Thread 1 [LWP 12345]").expect("crashed thread");
    let other = text.find("Thread 2 [LWP 12346]").expect("other thread");
    assert!(crashed < other, "crashed thread is printed first");

    let rax = text.find("rax:").expect("rax");
    let r12 = text.find("r12:").expect("r12");
    let rip = text.find("rip:").expect("rip");
    assert!(rax < r12 && r12 < rip, "general, extended, special");

    assert!(text.contains("Thread Summary:\n  Interconnect RX: 1\n"));
    assert!(text.contains("  libpostgres.so [0x0000000000b00000-0x0000000000c00000]"));
    assert!(text.contains("  plpython3.so [0x00007f8b4a900000-0x00007f8b4a9a0000]"));
    assert!(text.contains("Database Core Libraries"));
    assert!(text.contains("Unloaded Libraries:\n  plpython3.so\n"));
}

#[test]
fn frames_render_like_the_debugger() {
    let mut frame = StackFrame::new("0", "0x00007f8b4c37c425", "raise");
    frame.module = Some("libc.so.6".to_string());
    assert_eq!(format_frame(&frame), "#0  0x00007f8b4c37c425 in raise () from libc.so.6");

    let mut frame = StackFrame::new("12", "", "ExecScan");
    frame.arguments = "node=0x1".to_string();
    frame.source_file = Some("execScan.c".to_string());
    frame.line_number = Some(99);
    assert_eq!(format_frame(&frame), "#12 ExecScan (node=0x1) at execScan.c:99");

    assert_eq!(format_frame(&StackFrame::new("1", "", SIGNAL_HANDLER_FRAME)), "#1  <signal handler called>");
}

#[test]
fn process_details_and_crash_context() {
    let mut info = BasicInfo::new();
    info.insert("process_type".into(), "Primary Segment Process".into());
    info.insert("database_id".into(), "5432".into());
    info.insert("connection_id".into(), "12".into());
    info.insert("segment_id".into(), "0".into());
    info.insert("client_addr".into(), "10.0.0.5".into());
    assert_eq!(
        process_details(&info),
        "Primary Segment Process (DB: 5432, Conn: 12) on segment 0 from 10.0.0.5"
    );
    assert_eq!(process_details(&BasicInfo::new()), "PostgreSQL Process");

    let context = crash_context(&fixture_analysis());
    assert!(context.starts_with("Primary Segment Process (DB: 6000, Conn: 12) on segment 0 from 10.0.0.5\n"));
    assert!(context.contains("Core dumped at: 2024-03-01 10:20:30 UTC\n"));
    assert!(context.contains("Active threads: 2\n"));
    assert!(context.contains("Crash occurred in: Signal Handler (Query: 0x55d0c2000000)\n"));
}

#[test]
fn comparison_report() {
    let analyses = vec![fixture_analysis(), fixture_analysis()];
    let mut out = Vec::new();
    render_comparison(&mut out, &compare_cores(&analyses)).expect("render");
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("Total cores: 2"));
    assert!(text.contains("  SIGSEGV: 2"));
    assert!(text.contains("Crash Patterns:"));
    assert!(text.contains("SIGSEGV x2: ExecScanFetch <- standard_ExecutorRun"));

    let mut out = Vec::new();
    render_comparison(&mut out, &CoreComparison::default()).expect("render");
    assert!(String::from_utf8(out).expect("utf8").contains("No recurring crash patterns."));
}
