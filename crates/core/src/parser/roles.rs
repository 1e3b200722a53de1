//! Thread role heuristics.
//!
//! Precedence, first match wins:
//! 1. a signal trampoline anywhere in the stack -> `Signal Handler`
//! 2. the ordered role table, tested against every frame innermost first
//! 3. behavioral keywords on the innermost function
//! 4. unknown (`None`)

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{StackFrame, ThreadInfo};
use crate::parser::frames::SIGNAL_HANDLER_FRAME;

pub const SIGNAL_HANDLER_ROLE: &str = "Signal Handler";

/// Engine thread-entry names and their role labels. Order is precedence.
const ROLE_TABLE: &[(&str, &str)] = &[
    ("rxthreadfunc", "Interconnect RX"),
    ("txthreadfunc", "Interconnect TX"),
    ("postmaster", "Postmaster"),
    ("bgwriter|backgroundwriter", "Background Writer"),
    ("checkpointer", "Checkpointer"),
    ("walwriter", "WAL Writer"),
    ("walsender", "WAL Sender"),
    ("walreceiver", "WAL Receiver"),
    ("autovacuum", "Autovacuum Worker"),
    ("motionlauncher", "Motion Launcher"),
    ("launcher", "AV Launcher"),
    ("^fts|ftsprobe", "FTS Probe"),
    ("seqserver", "Sequence Server"),
    ("rg_worker", "Resource Group Worker"),
    ("resgroup", "Resource Group"),
    ("cdbgang", "Gang Worker"),
    ("distributor", "Motion Node"),
    ("executor", "Query Executor"),
    ("stats", "Stats Collector"),
    ("backendmain", "Backend Worker"),
    ("startup", "Startup Process"),
    ("logger", "Logger Process"),
];

static ROLE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    ROLE_TABLE
        .iter()
        .map(|(pattern, role)| {
            let re = Regex::new(&format!("(?i){pattern}"))
                .expect("ROLE_TABLE regex pattern is valid");
            (re, *role)
        })
        .collect()
});

const SYSTEM_FUNCTIONS: &[&str] =
    &["main", "clone", "fork", "exec", "exit", "abort", "raise", "poll", "select", "read", "write"];
const SYSTEM_PREFIXES: &[&str] = &["std::", "__", "_Z", "pthread_"];

/// Functions never reported as the "key" function of a thread.
const KEY_FUNCTION_SKIP: &[&str] =
    &["raise", "clone", "start_thread", "poll", "select", "epoll_wait", "??"];

/// True for frames the kernel or runtime inserts when a handler runs.
pub fn is_signal_trampoline(function: &str) -> bool {
    function == SIGNAL_HANDLER_FRAME
        || function == "__restore_rt"
        || function.contains("SigillSigsegvSigbus")
}

pub fn has_signal_trampoline(backtrace: &[StackFrame]) -> bool {
    backtrace.iter().any(|f| is_signal_trampoline(&f.function))
}

/// Runtime, libc and compiler-internal symbols that never label a thread.
pub fn is_system_function(name: &str) -> bool {
    SYSTEM_FUNCTIONS.contains(&name) || SYSTEM_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Frames that say nothing about the crash site: system symbols, signal
/// trampolines, unresolved `??` frames and thread entry points.
pub fn is_runtime_frame(name: &str) -> bool {
    name.is_empty()
        || is_system_function(name)
        || is_signal_trampoline(name)
        || KEY_FUNCTION_SKIP.contains(&name)
}

/// Role label for a backtrace, or `None` when nothing identifies it.
pub fn classify_role(backtrace: &[StackFrame]) -> Option<&'static str> {
    if has_signal_trampoline(backtrace) {
        return Some(SIGNAL_HANDLER_ROLE);
    }
    for frame in backtrace {
        if let Some((_, role)) = ROLE_RULES.iter().find(|(re, _)| re.is_match(&frame.function)) {
            return Some(role);
        }
    }
    let innermost = backtrace.first()?.function.to_ascii_lowercase();
    if innermost.contains("exec") || innermost.contains("dispatch") {
        Some("Query Dispatcher")
    } else if innermost.contains("poll") {
        Some("Network Poller")
    } else {
        None
    }
}

/// First frame function that says something about what the thread was doing.
pub fn find_key_function(backtrace: &[StackFrame]) -> Option<&str> {
    backtrace
        .iter()
        .map(|f| f.function.as_str())
        .find(|name| !KEY_FUNCTION_SKIP.contains(name) && !is_signal_trampoline(name))
}

/// Role label to thread count. Unknown threads are bucketed by their first
/// non-system function and skipped when they have none.
pub fn thread_summary(threads: &[ThreadInfo]) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for thread in threads {
        let label = match thread.role() {
            Some(role) => role.to_string(),
            None => match thread
                .backtrace
                .iter()
                .map(|f| f.function.as_str())
                .find(|name| !name.is_empty() && *name != "??" && !is_system_function(name))
            {
                Some(name) => format!("Unknown ({name})"),
                None => continue,
            },
        };
        *summary.entry(label).or_insert(0) += 1;
    }
    summary
}
