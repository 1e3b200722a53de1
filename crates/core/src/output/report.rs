//! Condensed human-readable reports in a gdb-like layout.

use std::io::Write;

use crate::error::OutputError;
use crate::model::{BasicInfo, CoreAnalysis, CoreComparison, StackFrame, ThreadInfo};
use crate::parser::frames::SIGNAL_HANDLER_FRAME;
use crate::parser::libraries::{analyze_libraries, category_description, category_order};
use crate::parser::primitives::basename;
use crate::parser::roles::thread_summary;

/// Register report layout: general purpose, extended, special.
const REGISTER_GROUPS: [&[&str]; 3] = [
    &[
        "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "eax", "ebx", "ecx", "edx", "esi",
        "edi", "ebp", "esp",
    ],
    &["r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15"],
    &["rip", "eip", "eflags", "cs", "ss", "ds", "es", "fs", "gs", "fs_base", "gs_base"],
];

/// Full single-dump report.
pub fn render_analysis<W: Write>(out: &mut W, analysis: &CoreAnalysis) -> Result<(), OutputError> {
    writeln!(out, "Database Core Analysis")?;
    writeln!(out, "======================")?;
    if let Some(desc) = analysis.basic_info.get("description") {
        writeln!(out, "Process: {desc}")?;
    }
    writeln!(out, "Core: {}", analysis.core_file)?;
    writeln!(out, "Time: {}", analysis.timestamp)?;
    writeln!(out, "PostgreSQL: {}", analysis.binary_info.version)?;
    writeln!(out, "Database: {}", analysis.binary_info.gp_version)?;

    let signal = &analysis.signal_info;
    writeln!(out)?;
    writeln!(
        out,
        "Program received signal {} ({}), {}",
        signal.signal_name, signal.signal_number, signal.signal_description
    )?;
    let fault_address = signal.fault_info.as_ref().map(|f| &f.address);
    if let Some(addr) = fault_address.or(signal.fault_address.as_ref()) {
        writeln!(out, "Fault address: {addr}")?;
    }

    writeln!(out)?;
    writeln!(out, "Thread Information:")?;
    let crashed = analysis.threads.iter().filter(|t| t.is_crashed);
    let others = analysis.threads.iter().filter(|t| !t.is_crashed);
    for thread in crashed.chain(others) {
        render_thread(out, thread)?;
        writeln!(out)?;
    }

    writeln!(out, "Registers:")?;
    for group in REGISTER_GROUPS {
        let mut any = false;
        for name in group {
            if let Some(value) = analysis.registers.get(*name) {
                writeln!(out, "{:<8} {value}", format!("{name}:"))?;
                any = true;
            }
        }
        if any {
            writeln!(out)?;
        }
    }

    let summary = thread_summary(&analysis.threads);
    if !summary.is_empty() {
        writeln!(out, "Thread Summary:")?;
        for (role, count) in &summary {
            writeln!(out, "  {role}: {count}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "Key Shared Libraries:")?;
    let key_libraries =
        analysis.libraries.iter().filter(|l| l.category == "Core" || l.category == "Extension");
    for lib in key_libraries {
        write!(out, "  {}", basename(&lib.name))?;
        if let Some(version) = &lib.version {
            write!(out, " (version {version})")?;
        }
        writeln!(out, " [{}-{}]", lib.start_addr, lib.end_addr)?;
    }

    let libs = analyze_libraries(&analysis.libraries);
    writeln!(out)?;
    writeln!(out, "Library Summary:")?;
    for category in category_order() {
        if let Some(count) = libs.category_counts.get(category) {
            writeln!(out, "  {:<28} {count:>3}", category_description(category))?;
        }
    }
    if !libs.unloaded_libraries.is_empty() {
        writeln!(out)?;
        writeln!(out, "Unloaded Libraries:")?;
        for name in &libs.unloaded_libraries {
            writeln!(out, "  {}", basename(name))?;
        }
    }
    Ok(())
}

fn render_thread<W: Write>(out: &mut W, thread: &ThreadInfo) -> Result<(), OutputError> {
    write!(out, "Thread {}", thread.thread_id)?;
    if let Some(lwp) = &thread.lwp_id {
        write!(out, " [LWP {lwp}]")?;
    }
    if let Some(role) = &thread.name {
        write!(out, " ({role})")?;
    }
    if thread.is_crashed {
        write!(out, " (Crashed)")?;
    }
    writeln!(out, ":")?;
    for frame in &thread.backtrace {
        writeln!(out, "{}", format_frame(frame))?;
    }
    Ok(())
}

/// One frame as gdb would print it.
pub fn format_frame(frame: &StackFrame) -> String {
    let mut line = format!("#{:<3}", frame.frame_num);
    if !frame.location.is_empty() {
        line.push_str(&format!("{} in ", frame.location));
    }
    line.push_str(&frame.function);
    if frame.function != SIGNAL_HANDLER_FRAME {
        line.push_str(&format!(" ({})", frame.arguments));
    }
    if let Some(module) = &frame.module {
        line.push_str(&format!(" from {module}"));
    }
    if let (Some(file), Some(lineno)) = (&frame.source_file, frame.line_number) {
        line.push_str(&format!(" at {file}:{lineno}"));
    }
    line
}

/// `Primary Segment Process (DB: 5432, Conn: 12) on segment 0 from 10.0.0.5`
pub fn process_details(info: &BasicInfo) -> String {
    let mut details = info
        .get("process_type")
        .cloned()
        .unwrap_or_else(|| "PostgreSQL Process".to_string());
    if let Some(db) = info.get("database_id") {
        details.push_str(&format!(" (DB: {db}"));
        if let Some(conn) = info.get("connection_id") {
            details.push_str(&format!(", Conn: {conn}"));
        }
        details.push(')');
    }
    if let Some(seg) = info.get("segment_id") {
        details.push_str(&format!(" on segment {seg}"));
    }
    if let Some(addr) = info.get("client_addr") {
        details.push_str(&format!(" from {addr}"));
    }
    details
}

/// Multi-line crash environment summary.
pub fn crash_context(analysis: &CoreAnalysis) -> String {
    let mut lines = vec![process_details(&analysis.basic_info)];
    if let Some(core_time) = analysis.basic_info.get("core_time") {
        lines.push(format!("Core dumped at: {core_time}"));
    }
    lines.push(format!("Active threads: {}", analysis.threads.len()));
    if let Some(role) = analysis.crashed_thread().and_then(|t| t.role()) {
        lines.push(format!("Crash occurred in: {role}"));
    }
    if let Some(cmd) = analysis.basic_info.get("command_id") {
        lines.push(format!("Command ID: {cmd}"));
    }
    if let Some(slice) = analysis.basic_info.get("slice_id") {
        lines.push(format!("Slice ID: {slice}"));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

pub fn render_comparison<W: Write>(
    out: &mut W,
    comparison: &CoreComparison,
) -> Result<(), OutputError> {
    writeln!(out, "Core Comparison")?;
    writeln!(out, "===============")?;
    writeln!(out, "Total cores: {}", comparison.total_cores)?;
    if let (Some(first), Some(last)) =
        (comparison.time_range.get("first"), comparison.time_range.get("last"))
    {
        writeln!(out, "Time range: {first} .. {last}")?;
    }

    writeln!(out)?;
    writeln!(out, "Signals:")?;
    for (signal, count) in &comparison.common_signals {
        writeln!(out, "  {signal}: {count}")?;
    }

    writeln!(out)?;
    if comparison.crash_patterns.is_empty() {
        writeln!(out, "No recurring crash patterns.")?;
        return Ok(());
    }
    writeln!(out, "Crash Patterns:")?;
    for pattern in &comparison.crash_patterns {
        writeln!(
            out,
            "  [{}] {} x{}: {}",
            pattern.signature_id,
            pattern.signal,
            pattern.occurrence_count,
            pattern.stack_signature.join(" <- ")
        )?;
        for file in &pattern.affected_core_files {
            writeln!(out, "    {file}")?;
        }
    }
    Ok(())
}
