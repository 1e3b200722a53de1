//! Assembly of one `CoreAnalysis` from a debugger transcript.
//!
//! The record is built by a single parsing pass and then mutated only by the
//! phases below, always in this order:
//! 1. deduplicate the flat stack trace and the thread list
//! 2. resolve the fault address to a mapped library
//! 3. settle thread roles, query context and the crashed thread
//! 4. infer the signal from the stacks when no payload was printed
//! 5. append crash-site context to the signal description
//!
//! Later phases read what earlier ones wrote, so the order is fixed.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{BinaryInfo, CoreAnalysis, FileInfo, SignalFault, SignalInfo, ThreadInfo};
use crate::parser::frames::{dedup_frames, parse_stack_trace};
use crate::parser::libraries::{find_address_library, parse_shared_libraries};
use crate::parser::process::parse_basic_info;
use crate::parser::registers::parse_registers;
use crate::parser::roles::{classify_role, find_key_function, has_signal_trampoline};
use crate::parser::signal::parse_signal_info;
use crate::parser::threads::{current_thread_id, dedup_threads, parse_threads};

/// Everything the pure pipeline needs for one core file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptInput {
    pub core_file: String,
    /// Combined stdout/stderr of the gdb batch session.
    pub transcript: String,
    pub file_info: FileInfo,
    pub binary_info: BinaryInfo,
    /// RFC 3339 analysis time; now when unset.
    pub timestamp: Option<String>,
}

impl TranscriptInput {
    pub fn new(core_file: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self { core_file: core_file.into(), transcript: transcript.into(), ..Self::default() }
    }
}

/// Parses and enhances one transcript.
pub fn assemble(input: &TranscriptInput) -> CoreAnalysis {
    let transcript = input.transcript.as_str();
    let mut analysis = CoreAnalysis {
        timestamp: input.timestamp.clone().unwrap_or_else(|| Utc::now().to_rfc3339()),
        core_file: input.core_file.clone(),
        file_info: input.file_info.clone(),
        basic_info: parse_basic_info(&input.file_info),
        stack_trace: parse_stack_trace(transcript),
        threads: parse_threads(transcript),
        registers: parse_registers(transcript),
        signal_info: parse_signal_info(transcript),
        libraries: parse_shared_libraries(transcript),
        binary_info: input.binary_info.clone(),
    };

    dedup_analysis(&mut analysis);
    resolve_fault_library(&mut analysis);
    enhance_threads(&mut analysis, current_thread_id(transcript).as_deref());
    infer_signal(&mut analysis);
    describe_crash_site(&mut analysis);

    log::debug!(
        "assembled {}: {} threads, {} frames, {} libraries, signal {}",
        analysis.core_file,
        analysis.threads.len(),
        analysis.stack_trace.len(),
        analysis.libraries.len(),
        analysis.signal_info.signal_name
    );
    analysis
}

/// Phase 1.
pub fn dedup_analysis(analysis: &mut CoreAnalysis) {
    analysis.stack_trace = dedup_frames(std::mem::take(&mut analysis.stack_trace));
    analysis.threads = dedup_threads(std::mem::take(&mut analysis.threads));
}

/// Phase 2: records which library maps the fault address, if any.
pub fn resolve_fault_library(analysis: &mut CoreAnalysis) {
    let Some(address) = analysis.signal_info.fault_address.clone() else {
        return;
    };
    let library = find_address_library(&address, &analysis.libraries).map(|lib| lib.name.clone());
    if let Some(fault) = analysis.signal_info.fault_info.as_mut() {
        fault.library = library;
    } else if library.is_some() {
        analysis.signal_info.fault_info = Some(SignalFault { address, addr_lsb: None, library });
    }
}

/// Phase 3. Frame content decides the crashed thread: the first thread with
/// a signal trampoline wins over any header marker. Without one, the first
/// marked header is used, then the `info threads` current row.
pub fn enhance_threads(analysis: &mut CoreAnalysis, current_thread: Option<&str>) {
    for thread in &mut analysis.threads {
        if thread.name.is_none() {
            thread.name = classify_role(&thread.backtrace).map(str::to_string);
        }
        add_query_context(thread);
    }

    let crashed = analysis
        .threads
        .iter()
        .position(|t| has_signal_trampoline(&t.backtrace))
        .or_else(|| analysis.threads.iter().position(|t| t.is_crashed))
        .or_else(|| {
            current_thread
                .and_then(|id| analysis.threads.iter().position(|t| t.thread_id == id))
        });
    for (idx, thread) in analysis.threads.iter_mut().enumerate() {
        thread.is_crashed = Some(idx) == crashed;
    }
}

fn add_query_context(thread: &mut ThreadInfo) {
    let query = thread.backtrace.iter().find_map(|f| f.local("queryDesc")).map(str::to_string);
    if let Some(query) = query {
        let role = thread.name.as_deref().unwrap_or("Unknown");
        if !role.contains("(Query: ") {
            thread.name = Some(format!("{role} (Query: {query})"));
        }
    }
}

/// Phase 4: only runs when no signal payload was parsed.
pub fn infer_signal(analysis: &mut CoreAnalysis) {
    if analysis.signal_info.is_known() {
        return;
    }
    let frames = || analysis.threads.iter().flat_map(|t| t.backtrace.iter());
    let inferred = if analysis.threads.iter().any(|t| has_signal_trampoline(&t.backtrace)) {
        Some((11, "SIGSEGV", "Segmentation fault"))
    } else if frames().any(|f| f.function.contains("AbortHandler")) {
        Some((6, "SIGABRT", "Process abort"))
    } else {
        None
    };
    if let Some((number, name, description)) = inferred {
        let previous = std::mem::take(&mut analysis.signal_info);
        analysis.signal_info = SignalInfo {
            signal_number: number,
            signal_code: 0,
            signal_name: name.to_string(),
            signal_description: description.to_string(),
            ..previous
        };
        log::debug!("{}: inferred {name} from stack content", analysis.core_file);
    }
}

/// Phase 5: active thread, fault address placement and engine context.
pub fn describe_crash_site(analysis: &mut CoreAnalysis) {
    if !analysis.signal_info.is_known() {
        return;
    }
    let mut desc = std::mem::take(&mut analysis.signal_info.signal_description);

    let active = analysis
        .threads
        .iter()
        .filter(|t| !t.is_crashed)
        .find_map(|t| find_key_function(&t.backtrace).map(|key| (key, t.role())));
    if let Some((key, role)) = active {
        if !desc.contains(key) {
            desc.push_str(&format!(" in {key}"));
            if let Some(role) = role {
                desc.push_str(&format!(" (thread: {role})"));
            }
        }
    }

    if analysis.signal_info.fault_address.is_some() {
        let library = analysis.signal_info.fault_info.as_ref().and_then(|f| f.library.as_deref());
        match library {
            Some(lib) => desc.push_str(&format!(" (fault address in {lib})")),
            None => desc.push_str(" (fault address not in mapped memory)"),
        }
    }

    if let Some(thread) = analysis.crashed_thread() {
        let contexts = [
            ("rxThreadFunc", "Crash occurred in interconnect receive thread"),
            ("MotionLayerEntry", "Crash occurred in motion layer"),
            ("execMain", "Crash occurred in query executor"),
        ];
        for (marker, text) in contexts {
            let hit = thread.backtrace.iter().any(|f| {
                f.function.contains(marker)
                    || f.source_file.as_deref().is_some_and(|s| s.contains(marker))
            });
            if hit {
                desc.push('\n');
                desc.push_str(text);
            }
        }
    }
    if let Some(cmdline) = analysis.basic_info.get("cmdline") {
        if cmdline.contains("seg") {
            desc.push_str(&format!("\nProcess was a segment worker: {cmdline}"));
        }
    }

    analysis.signal_info.signal_description = desc;
}
