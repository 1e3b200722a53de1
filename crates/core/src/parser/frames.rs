//! Backtrace line parsing.
//!
//! Handles the frame shapes gdb prints:
//! - `#0  0x00007f.. in raise () from /lib64/libc.so.6`
//! - `#3  ExecutorRun (queryDesc=0x55..) at execMain.c:312`
//! - `#1  <signal handler called>`

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::model::StackFrame;
use crate::parser::primitives::{basename, matching_paren, parse_assignments};

/// Function name gdb prints for the signal trampoline frame.
pub const SIGNAL_HANDLER_FRAME: &str = "<signal handler called>";

static FRAME_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#(\d+)\s+(?:(0x[0-9a-fA-F]+)\s+in\s+)?")
        .expect("FRAME_HEAD regex pattern is valid")
});
static SIGNAL_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#(\d+)\s+(?:(0x[0-9a-fA-F]+)\s+in\s+)?<signal handler called>")
        .expect("SIGNAL_FRAME regex pattern is valid")
});
static SOURCE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bat\s+([^:\s]+):(\d+)").expect("SOURCE_LOCATION regex pattern is valid")
});
static FROM_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfrom\s+(\S+)").expect("FROM_MODULE regex pattern is valid"));
static INLINE_LOCALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"locals\s*=\s*\{([^}]*)\}").expect("INLINE_LOCALS regex pattern is valid")
});
static LOCAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+([A-Za-z_][A-Za-z0-9_.]*)\s+=\s+(.*?)\s*$")
        .expect("LOCAL_LINE regex pattern is valid")
});

/// Parses one backtrace line. Lines that are not frames yield `None`.
pub fn parse_frame(line: &str) -> Option<StackFrame> {
    if let Some(caps) = SIGNAL_FRAME.captures(line) {
        let location = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return Some(StackFrame::new(&caps[1], location, SIGNAL_HANDLER_FRAME));
    }

    let caps = FRAME_HEAD.captures(line)?;
    let start = caps.get(0)?.end();
    let open = start + argument_list_start(&line[start..])?;
    let function = line[start..open].trim_end();
    let (arguments, rest) = match matching_paren(line, open) {
        Some(close) => (&line[open + 1..close], &line[close + 1..]),
        None => (&line[open + 1..], ""),
    };

    let mut frame = StackFrame::new(
        &caps[1],
        caps.get(2).map(|m| m.as_str()).unwrap_or_default(),
        function,
    );
    frame.arguments = arguments.trim().to_string();

    if let Some(src) = SOURCE_LOCATION.captures(rest) {
        frame.source_file = Some(src[1].to_string());
        frame.line_number = src[2].parse().ok();
    }
    if let Some(module) = FROM_MODULE.captures(rest) {
        frame.module = Some(basename(&module[1]));
    }
    if let Some(locals) = INLINE_LOCALS.captures(rest) {
        let map: BTreeMap<String, String> = parse_assignments(&locals[1]).into_iter().collect();
        if !map.is_empty() {
            frame.locals = Some(map);
        }
    }

    Some(frame)
}

/// Offset of the `(` opening the argument list in `name (args) ...`.
///
/// C++ symbols may contain spaces and parens of their own
/// (`CDynamicPtrArray<T, &CleanupRelease<T> >::Append`,
/// `(anonymous namespace)::f`, `operator()`), so the list is the first `(`
/// outside template brackets and nested parens that follows whitespace.
/// Without one, the first such `(` after a non-empty name is used.
fn argument_list_start(text: &str) -> Option<usize> {
    let mut angle = 0usize;
    let mut paren = 0usize;
    let mut fallback = None;
    let mut prev = ' ';
    for (idx, ch) in text.char_indices() {
        match ch {
            '<' => angle += 1,
            '>' if prev != '-' => angle = angle.saturating_sub(1),
            '(' if angle == 0 && paren == 0 && !text[..idx].trim().is_empty() => {
                if prev.is_whitespace() {
                    return Some(idx);
                }
                if fallback.is_none() {
                    fallback = Some(idx);
                }
                paren += 1;
            }
            '(' => paren += 1,
            ')' => paren = paren.saturating_sub(1),
            _ => {}
        }
        prev = ch;
    }
    fallback
}

/// Parses a `bt full` local line (`        queryDesc = 0x55d0...`).
pub fn parse_local_line(line: &str) -> Option<(String, String)> {
    if line.trim_start().starts_with('#') {
        return None;
    }
    let caps = LOCAL_LINE.captures(line)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Net `{` minus `}` count of a value, ignoring braces inside quotes.
pub fn brace_delta(text: &str) -> i32 {
    let mut delta = 0;
    let mut quoted = false;
    let mut escaped = false;
    for ch in text.chars() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '{' if !quoted => delta += 1,
            '}' if !quoted => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Appends a continuation line of a pretty-printed value.
pub fn fold_continuation(value: &mut String, piece: &str) {
    if !(value.ends_with('{') || piece.starts_with('}') || piece.is_empty()) {
        value.push(' ');
    }
    value.push_str(piece);
}

/// Attaches a `bt full` local to a frame. Inline locals already present win.
pub fn attach_local(frame: &mut StackFrame, name: String, value: String) {
    frame.locals.get_or_insert_with(BTreeMap::new).entry(name).or_insert(value);
}

/// Flat stack trace: frames found after any line starting with `Thread`, up
/// to the next blank line.
pub fn parse_stack_trace(transcript: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut in_trace = false;
    for line in transcript.lines() {
        let trimmed = line.trim_start_matches(['*', ' ']);
        if trimmed.starts_with("Thread") {
            in_trace = true;
            continue;
        }
        if !in_trace {
            continue;
        }
        if line.trim().is_empty() {
            in_trace = false;
            continue;
        }
        if line.trim_start().starts_with('#') {
            if let Some(frame) = parse_frame(line) {
                frames.push(frame);
            }
        }
    }
    frames
}

/// Removes repeated frames by (function, location, module), keeping the
/// first occurrence and the original order.
pub fn dedup_frames(frames: Vec<StackFrame>) -> Vec<StackFrame> {
    let mut seen: HashSet<(String, String, Option<String>)> = HashSet::new();
    frames
        .into_iter()
        .filter(|f| {
            let (func, loc, module) = f.identity();
            seen.insert((func.to_string(), loc.to_string(), module.map(str::to_string)))
        })
        .collect()
}
