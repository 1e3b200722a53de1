use corelens_core::model::{CoreAnalysis, FileInfo, StackFrame, ThreadInfo};
use corelens_core::parser::decode_signal;
use corelens_core::services::assembler::{describe_crash_site, enhance_threads, infer_signal};
use corelens_core::services::{assemble, TranscriptInput};

const FIXTURE: &str = include_str!("fixtures/segv_transcript.txt");

fn fixture_input() -> TranscriptInput {
    let mut input = TranscriptInput::new("/data/cores/core.12345", FIXTURE);
    input.file_info = FileInfo {
        file_output: "/data/cores/core.12345: ELF 64-bit LSB core file, x86-64, version 1 (SYSV), \
            SVR4-style, from 'postgres:  6000, gpadmin tpch 10.0.0.5(4711) con12 seg0 cmd3 slice1 MPPEXEC SELECT'"
            .to_string(),
        size: 1 << 20,
        created: "2024-03-01T10:20:30+00:00".to_string(),
    };
    input.timestamp = Some("2024-03-01T11:00:00+00:00".to_string());
    input
}

fn thread(id: &str, role: Option<&str>, functions: &[&str]) -> ThreadInfo {
    let mut thread = ThreadInfo::new(id);
    thread.name = role.map(str::to_string);
    thread.backtrace = functions
        .iter()
        .enumerate()
        .map(|(idx, name)| StackFrame::new(idx.to_string(), format!("0x{:x}", idx + 16), *name))
        .collect();
    thread
}

#[test]
fn fixture_assembles_into_a_complete_analysis() {
    let analysis = assemble(&fixture_input());

    assert_eq!(analysis.core_file, "/data/cores/core.12345");
    assert_eq!(analysis.timestamp, "2024-03-01T11:00:00+00:00");
    assert_eq!(analysis.threads.len(), 2);
    assert_eq!(analysis.stack_trace.len(), 7);
    assert_eq!(analysis.libraries.len(), 5);
    assert_eq!(analysis.registers.len(), 7);
    assert_eq!(analysis.basic_info.get("segment_id").map(String::as_str), Some("0"));

    let crashed = analysis.crashed_thread().expect("crashed thread");
    assert_eq!(crashed.thread_id, "1");
    assert_eq!(crashed.name.as_deref(), Some("Signal Handler (Query: 0x55d0c2000000)"));
    assert_eq!(analysis.threads.iter().filter(|t| t.is_crashed).count(), 1);

    let rx = &analysis.threads[0];
    assert_eq!(rx.name.as_deref(), Some("Interconnect RX"));
    assert_eq!(rx.lwp_id.as_deref(), Some("12346"));
    assert_eq!(rx.handle.as_deref(), Some("0x7f8b4a5ff700"));

    let signal = &analysis.signal_info;
    assert_eq!(signal.signal_number, 11);
    assert_eq!(signal.signal_name, "SIGSEGV");
    assert_eq!(signal.fault_address.as_deref(), Some("0x0000000000b1e2f8"));
    let fault = signal.fault_info.as_ref().expect("fault info");
    assert_eq!(fault.library.as_deref(), Some("/usr/local/gpdb/lib/libpostgres.so"));

    let desc = &signal.signal_description;
    assert!(desc.starts_with("Segmentation fault - SEGV_MAPERR"), "{desc}");
    assert!(desc.contains(" in rxThreadFunc (thread: Interconnect RX)"), "{desc}");
    assert!(desc.contains(" (fault address in /usr/local/gpdb/lib/libpostgres.so)"), "{desc}");
    assert!(desc.contains("\nCrash occurred in query executor"), "{desc}");
    assert!(desc.contains("\nProcess was a segment worker: postgres:  6000"), "{desc}");
}

#[test]
fn active_thread_role_is_appended_to_the_description() {
    let mut analysis = CoreAnalysis {
        threads: vec![
            thread("1", None, &["raise", "StandardHandlerForSigillSigsegvSigbus", "StatementCancelHandler"]),
            thread("2", Some("Query Worker"), &["processQuery", "start_thread"]),
        ],
        signal_info: decode_signal(11, 0),
        ..Default::default()
    };
    enhance_threads(&mut analysis, None);
    infer_signal(&mut analysis);
    describe_crash_site(&mut analysis);

    assert_eq!(analysis.threads[0].name.as_deref(), Some("Signal Handler"));
    assert!(analysis.threads[0].is_crashed);
    assert_eq!(analysis.threads[1].name.as_deref(), Some("Query Worker"));
    assert_eq!(
        analysis.signal_info.signal_description,
        "Segmentation fault in processQuery (thread: Query Worker)"
    );
}

#[test]
fn unmapped_fault_address_is_reported() {
    let transcript = "Thread 1 (LWP 1):\n#0  0x1 in foo ()\n\nsi_signo = 7\nsi_code = 2\nsi_addr = 0x99\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    let desc = &analysis.signal_info.signal_description;
    assert!(desc.starts_with("Bus error - BUS_ADRERR"), "{desc}");
    assert!(desc.ends_with(" in foo (fault address not in mapped memory)"), "{desc}");
    assert_eq!(analysis.signal_info.fault_info, None);
}

#[test]
fn frame_content_beats_header_marker() {
    let transcript = "* Thread 2 (LWP 20):\n#0  0x1 in WaitLatch ()\n\n\
        Thread 1 (LWP 10):\n#0  0x2 in raise ()\n#1  <signal handler called>\n#2  0x3 in foo ()\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    let crashed: Vec<&str> = analysis
        .threads
        .iter()
        .filter(|t| t.is_crashed)
        .map(|t| t.thread_id.as_str())
        .collect();
    assert_eq!(crashed, vec!["1"]);
}

#[test]
fn header_marker_beats_current_thread_row() {
    let transcript = "* 1    Thread 0x7f00 (LWP 10) \"postgres\" 0x1 in foo ()\n\n\
        Thread 2 (LWP 20):\n#0  0x1 in bar ()\n\n\
        * Thread 3 (LWP 30):\n#0  0x2 in baz ()\n\n\
        Thread 1 (LWP 10):\n#0  0x3 in foo ()\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    let crashed = analysis.crashed_thread().expect("crashed thread");
    assert_eq!(crashed.thread_id, "3");
    assert_eq!(analysis.threads.iter().filter(|t| t.is_crashed).count(), 1);
}

#[test]
fn current_thread_row_is_the_last_resort() {
    let transcript = "* 2    Thread 0x7f00 (LWP 20) \"postgres\" 0x1 in bar ()\n\n\
        Thread 2 (LWP 20):\n#0  0x1 in bar ()\n\n\
        Thread 1 (LWP 10):\n#0  0x3 in foo ()\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    assert_eq!(analysis.crashed_thread().map(|t| t.thread_id.as_str()), Some("2"));
}

#[test]
fn no_crash_evidence_marks_no_thread() {
    let transcript = "Thread 1 (LWP 10):\n#0  0x3 in foo ()\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    assert!(analysis.crashed_thread().is_none());
    assert!(!analysis.signal_info.is_known());
    assert_eq!(analysis.signal_info.signal_description, "");
}

#[test]
fn trampoline_without_payload_infers_segv() {
    let transcript = "Thread 1 (LWP 1):\n#0  0x1 in raise ()\n#1  <signal handler called>\n#2  0x2 in foo ()\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    assert_eq!(analysis.signal_info.signal_number, 11);
    assert_eq!(analysis.signal_info.signal_name, "SIGSEGV");
    assert_eq!(analysis.signal_info.signal_description, "Segmentation fault");
}

#[test]
fn abort_handler_without_payload_infers_abort() {
    let transcript = "Thread 1 (LWP 1):\n#0  0x1 in raise ()\n#1  0x2 in AbortHandler (sig=6)\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    assert_eq!(analysis.signal_info.signal_number, 6);
    assert_eq!(analysis.signal_info.signal_name, "SIGABRT");
    assert_eq!(analysis.signal_info.signal_description, "Process abort in AbortHandler");
}

#[test]
fn parsed_signal_is_never_overridden_by_inference() {
    let transcript = "Program terminated with signal SIGBUS, Bus error.\n\
        Thread 1 (LWP 1):\n#0  0x1 in raise ()\n#1  <signal handler called>\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    assert_eq!(analysis.signal_info.signal_name, "SIGBUS");
    assert_eq!(analysis.signal_info.signal_description, "Bus error");
}

#[test]
fn query_context_labels_unknown_threads() {
    let mut worker = thread("5", None, &["foo"]);
    let mut locals = std::collections::BTreeMap::new();
    locals.insert("queryDesc".to_string(), "0xabc".to_string());
    worker.backtrace[0].locals = Some(locals);
    let mut analysis = CoreAnalysis { threads: vec![worker], ..Default::default() };
    enhance_threads(&mut analysis, None);
    enhance_threads(&mut analysis, None);
    assert_eq!(analysis.threads[0].name.as_deref(), Some("Unknown (Query: 0xabc)"));
}

#[test]
fn duplicate_frames_are_removed_from_the_flat_trace() {
    let transcript = "Thread 1 (LWP 1):\n#0  0x1 in a ()\n#1  0x2 in b ()\n\n\
        Thread 1 (LWP 1):\n#0  0x1 in a ()\n#1  0x2 in b ()\n";
    let analysis = assemble(&TranscriptInput::new("core.1", transcript));
    assert_eq!(analysis.stack_trace.len(), 2);
    assert_eq!(analysis.threads.len(), 1);
}
