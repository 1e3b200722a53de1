//! Thread segmentation of a debugger transcript.
//!
//! A single forward scan: every thread header starts a new block, frame lines
//! inside the block are attached to it, and indented `name = value` lines
//! directly under a frame (the `bt full` layout) become that frame's locals.
//! With `set print pretty on` a struct local spans several lines; those are
//! folded into one value until its braces balance.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::ThreadInfo;
use crate::parser::frames::{
    attach_local, brace_delta, fold_continuation, parse_frame, parse_local_line,
};
use crate::parser::roles::classify_role;

static THREAD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\*\s*)?Thread\s+(\d+)\b").expect("THREAD_HEADER regex pattern is valid")
});
static HEADER_LWP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LWP\s+(\d+)").expect("HEADER_LWP regex pattern is valid"));
static HEADER_HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Thread\s+(0x[0-9a-fA-F]+)").expect("HEADER_HANDLE regex pattern is valid")
});
static HEADER_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").expect("HEADER_STATE regex pattern is valid"));
static CURRENT_THREAD_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\*\s+(\d+)\s+(?:Thread|LWP|process)\b")
        .expect("CURRENT_THREAD_ROW regex pattern is valid")
});

/// Parses a thread header line into an empty thread record.
pub fn parse_thread_header(line: &str) -> Option<ThreadInfo> {
    let caps = THREAD_HEADER.captures(line)?;
    let mut thread = ThreadInfo::new(&caps[2]);
    thread.is_crashed = caps.get(1).is_some();
    thread.lwp_id = HEADER_LWP.captures(line).map(|c| c[1].to_string());
    thread.handle = HEADER_HANDLE.captures(line).map(|c| c[1].to_string());
    thread.state = HEADER_STATE.captures(line).map(|c| c[1].trim().to_string());
    Some(thread)
}

/// Ordinal of the row gdb's `info threads` marks as current (`* 1  Thread ...`).
pub fn current_thread_id(transcript: &str) -> Option<String> {
    transcript
        .lines()
        .find_map(|line| CURRENT_THREAD_ROW.captures(line).map(|c| c[1].to_string()))
}

/// Splits a transcript into threads with their frames, classifies each
/// thread's role and drops repeated thread ids (first occurrence wins).
///
/// Threads that end up without frames are not emitted.
pub fn parse_threads(transcript: &str) -> Vec<ThreadInfo> {
    let mut threads = Vec::new();
    let mut current: Option<ThreadInfo> = None;
    // Locals attach only while the previous line belonged to a frame.
    let mut in_frame = false;
    // Multi-line local still waiting for its closing brace.
    let mut pending: Option<PendingLocal> = None;

    for line in transcript.lines() {
        if let Some(header) = parse_thread_header(line) {
            if let Some(mut done) = current.take() {
                flush_local(&mut done, &mut pending);
                threads.push(done);
            }
            current = Some(header);
            in_frame = false;
            continue;
        }
        let Some(thread) = current.as_mut() else {
            continue;
        };
        if let Some(mut local) = pending.take() {
            let piece = line.trim();
            if !piece.starts_with('#') {
                fold_continuation(&mut local.value, piece);
                local.depth += brace_delta(piece);
                if local.depth > 0 {
                    pending = Some(local);
                } else if let Some(frame) = thread.backtrace.last_mut() {
                    attach_local(frame, local.name, local.value);
                }
                continue;
            }
            // Unbalanced value cut short by the next frame.
            if let Some(frame) = thread.backtrace.last_mut() {
                attach_local(frame, local.name, local.value);
            }
        }
        if line.trim_start().starts_with('#') {
            match parse_frame(line) {
                Some(frame) => {
                    thread.backtrace.push(frame);
                    in_frame = true;
                }
                None => in_frame = false,
            }
            continue;
        }
        if in_frame {
            match (parse_local_line(line), thread.backtrace.last_mut()) {
                (Some((name, value)), Some(frame)) => {
                    let depth = brace_delta(&value);
                    if depth > 0 {
                        pending = Some(PendingLocal { name, value, depth });
                    } else {
                        attach_local(frame, name, value);
                    }
                }
                _ => in_frame = false,
            }
        }
    }
    if let Some(mut done) = current.take() {
        flush_local(&mut done, &mut pending);
        threads.push(done);
    }

    let threads = threads
        .into_iter()
        .filter(|t| {
            if t.backtrace.is_empty() {
                log::debug!("dropping thread {} without frames", t.thread_id);
                false
            } else {
                true
            }
        })
        .map(|mut t| {
            t.name = classify_role(&t.backtrace).map(str::to_string);
            t
        })
        .collect();
    dedup_threads(threads)
}

struct PendingLocal {
    name: String,
    value: String,
    depth: i32,
}

/// Attaches an unterminated multi-line local as far as it was read.
fn flush_local(thread: &mut ThreadInfo, pending: &mut Option<PendingLocal>) {
    if let (Some(local), Some(frame)) = (pending.take(), thread.backtrace.last_mut()) {
        attach_local(frame, local.name, local.value);
    }
}

/// Keeps the first thread for every thread id, preserving order.
pub fn dedup_threads(threads: Vec<ThreadInfo>) -> Vec<ThreadInfo> {
    let mut seen = HashSet::new();
    threads.into_iter().filter(|t| seen.insert(t.thread_id.clone())).collect()
}
