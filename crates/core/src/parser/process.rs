//! Process identity from the file-type probe line.
//!
//! `file` prints the process title of the dumped process
//! (`from 'postgres:  5432, gpadmin db 10.0.0.5(4711) con12 seg0 cmd3 slice1'`)
//! along with the uid/gid quartet and `execfn`. Every capture is optional;
//! a miss simply leaves the key out of the map.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::{BasicInfo, FileInfo};

/// Process-title keywords and their descriptions. Order is precedence.
const PROCESS_TYPES: &[(&str, &str)] = &[
    ("coredw", "Coordinator Write Process"),
    ("corerd", "Coordinator Read Process"),
    ("primary", "Primary Segment Process"),
    ("mirror", "Mirror Segment Process"),
    ("master", "Master Process"),
    ("standby", "Standby Master Process"),
    ("checkpointer", "Checkpointer Process"),
    ("background writer", "Background Writer Process"),
    ("walwriter", "WAL Writer Process"),
    ("wal sender", "WAL Sender Process"),
    ("wal receiver", "WAL Receiver Process"),
    ("autovacuum", "Autovacuum Process"),
    ("stats collector", "Stats Collector Process"),
    ("logger", "Logger Process"),
];

static CMDLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"from '([^']*)'").expect("CMDLINE regex pattern is valid"));
static SEGMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bseg(-?\d+)\b").expect("SEGMENT_ID regex pattern is valid"));
static CONNECTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcon(\d+)\b").expect("CONNECTION_ID regex pattern is valid"));
static COMMAND_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcmd(\d+)\b").expect("COMMAND_ID regex pattern is valid"));
static SLICE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bslice(\d+)\b").expect("SLICE_ID regex pattern is valid"));
static TRANSACTION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"xact\S*\s+(\d+)").expect("TRANSACTION_ID regex pattern is valid")
});
static CLIENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s([^\s(]+)\((\d+)\)").expect("CLIENT regex pattern is valid"));
static EXECFN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"execfn: '([^']*)'").expect("EXECFN regex pattern is valid"));
static PRIVILEGES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"real uid: (\d+)", "real_uid"),
        (r"effective uid: (\d+)", "effective_uid"),
        (r"real gid: (\d+)", "real_gid"),
        (r"effective gid: (\d+)", "effective_gid"),
    ]
    .into_iter()
    .map(|(pattern, key)| (Regex::new(pattern).expect("PRIVILEGES regex pattern is valid"), key))
    .collect()
});

/// Derived process facts for one core file.
pub fn parse_basic_info(file_info: &FileInfo) -> BasicInfo {
    let mut info = BasicInfo::new();
    let output = file_info.file_output.as_str();

    if let Some(caps) = CMDLINE.captures(output) {
        let cmdline = caps[1].to_string();
        classify_cmdline(&cmdline, &mut info);
        info.insert("cmdline".into(), cmdline);
    }
    for (re, key) in PRIVILEGES.iter() {
        if let Some(caps) = re.captures(output) {
            info.insert((*key).into(), caps[1].to_string());
        }
    }
    if let Some(caps) = EXECFN.captures(output) {
        info.insert("execfn".into(), caps[1].to_string());
    }
    if let Ok(created) = DateTime::parse_from_rfc3339(&file_info.created) {
        let core_time = created.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S UTC");
        info.insert("core_time".into(), core_time.to_string());
    }

    if let Some(description) = describe(&info) {
        info.insert("description".into(), description);
    }
    info
}

/// Fills the process-title keys (`process`, `process_type`, ids, client).
pub fn classify_cmdline(cmdline: &str, info: &mut BasicInfo) {
    let mut tokens = cmdline.split_whitespace();
    if let Some(first) = tokens.next() {
        let process = first.trim_end_matches(':');
        if !process.is_empty() {
            info.insert("process".into(), process.to_string());
        }
        if first.ends_with(':') {
            if let Some(db) = tokens.next().map(|t| t.trim_end_matches(',')) {
                if !db.is_empty() && db.chars().all(|c| c.is_ascii_digit()) {
                    info.insert("database_id".into(), db.to_string());
                }
            }
        }
    }

    let lowered = cmdline.to_ascii_lowercase();
    if let Some((_, desc)) = PROCESS_TYPES.iter().find(|(key, _)| lowered.contains(key)) {
        info.insert("process_type".into(), (*desc).to_string());
    }

    let ids: [(&Regex, &str); 5] = [
        (&*SEGMENT_ID, "segment_id"),
        (&*CONNECTION_ID, "connection_id"),
        (&*COMMAND_ID, "command_id"),
        (&*SLICE_ID, "slice_id"),
        (&*TRANSACTION_ID, "transaction_id"),
    ];
    for (re, key) in ids {
        if let Some(caps) = re.captures(cmdline) {
            info.insert(key.into(), caps[1].to_string());
        }
    }

    if let Some(caps) = CLIENT.captures(cmdline) {
        info.insert("client_addr".into(), caps[1].to_string());
        info.insert("client_pid".into(), caps[2].to_string());
    }
}

/// Comma-joined summary in a fixed field order; `None` when nothing is known.
pub fn describe(info: &BasicInfo) -> Option<String> {
    let layout: [(&str, &str); 7] = [
        ("process_type", ""),
        ("database_id", "DB "),
        ("segment_id", "segment "),
        ("connection_id", "connection "),
        ("command_id", "command "),
        ("slice_id", "slice "),
        ("client_addr", "client "),
    ];
    let parts: Vec<String> = layout
        .iter()
        .filter_map(|(key, label)| info.get(*key).map(|value| format!("{label}{value}")))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
