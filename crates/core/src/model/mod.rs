//! Crash model: the records produced by parsing one debugger transcript, and
//! the derived records produced by comparing many of them.
//!
//! Every type here is serde-friendly so an analysis can be written as JSON or
//! YAML and read back without loss. Optional fields are skipped when empty so
//! the documents stay readable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Open map of derived process facts (ids, client address, uid/gid, ...).
///
/// Kept as a map because the process-title grammar varies per process role
/// and every field is optional.
pub type BasicInfo = BTreeMap<String, String>;

/// Register name to the raw value text printed by the debugger.
pub type Registers = BTreeMap<String, String>;

/// One frame of a backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StackFrame {
    /// Frame ordinal as printed (`#3` -> "3"). Not guaranteed contiguous.
    pub frame_num: String,
    /// Program counter text; empty for frames printed without an address.
    pub location: String,
    /// Function symbol; `??` when the debugger could not resolve it.
    pub function: String,
    #[serde(rename = "args")]
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    /// File name of the shared object the frame belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locals: Option<BTreeMap<String, String>>,
}

impl StackFrame {
    pub fn new(
        frame_num: impl Into<String>,
        location: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            frame_num: frame_num.into(),
            location: location.into(),
            function: function.into(),
            ..Self::default()
        }
    }

    /// Key used for stack-trace deduplication.
    pub fn identity(&self) -> (&str, &str, Option<&str>) {
        (&self.function, &self.location, self.module.as_deref())
    }

    pub fn local(&self, name: &str) -> Option<&str> {
        self.locals.as_ref().and_then(|l| l.get(name)).map(String::as_str)
    }
}

/// A thread and its backtrace (innermost frame first).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lwp_id: Option<String>,
    /// OS thread handle (`Thread 0x7f...`) when the header printed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Semantic role; `None` means the role is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_crashed: bool,
    #[serde(default)]
    pub backtrace: Vec<StackFrame>,
}

impl ThreadInfo {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self { thread_id: thread_id.into(), ..Self::default() }
    }

    pub fn role(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Structured fault detail from the `_sigfault` member of the signal payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalFault {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr_lsb: Option<String>,
    /// Shared library whose mapped range contains `address`, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// The signal that terminated the process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalInfo {
    pub signal_number: i32,
    pub signal_code: i32,
    pub signal_name: String,
    pub signal_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_info: Option<SignalFault>,
}

impl SignalInfo {
    pub fn is_known(&self) -> bool {
        self.signal_number != 0
    }
}

/// One row of the debugger's shared-library table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LibraryInfo {
    /// Full path as printed.
    pub name: String,
    pub start_addr: String,
    pub end_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub category: String,
    pub is_loaded: bool,
}

/// Facts about the core file itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    /// Single-line output of the file-type probe.
    pub file_output: String,
    pub size: u64,
    /// Modification time, RFC 3339.
    pub created: String,
}

/// Version and build facts of the crashed database binary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BinaryInfo {
    pub binary_path: String,
    pub version: String,
    pub gp_version: String,
    #[serde(default)]
    pub build_options: Vec<String>,
}

/// Complete analysis of one core file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoreAnalysis {
    /// Analysis time, RFC 3339.
    pub timestamp: String,
    pub core_file: String,
    pub file_info: FileInfo,
    #[serde(default)]
    pub basic_info: BasicInfo,
    #[serde(default)]
    pub stack_trace: Vec<StackFrame>,
    #[serde(default)]
    pub threads: Vec<ThreadInfo>,
    #[serde(default)]
    pub registers: Registers,
    pub signal_info: SignalInfo,
    #[serde(rename = "shared_libraries", default)]
    pub libraries: Vec<LibraryInfo>,
    #[serde(rename = "postgres_info", default)]
    pub binary_info: BinaryInfo,
}

impl CoreAnalysis {
    pub fn crashed_thread(&self) -> Option<&ThreadInfo> {
        self.threads.iter().find(|t| t.is_crashed)
    }
}

/// A crash signature shared by at least two analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashPattern {
    /// Short stable hash of the signature key.
    pub signature_id: String,
    pub signal: String,
    pub stack_signature: Vec<String>,
    pub occurrence_count: usize,
    #[serde(rename = "core_files")]
    pub affected_core_files: Vec<String>,
}

/// Result of comparing many analyses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoreComparison {
    pub total_cores: usize,
    #[serde(rename = "signal_distribution")]
    pub common_signals: BTreeMap<String, usize>,
    #[serde(rename = "function_distribution")]
    pub common_functions: BTreeMap<String, usize>,
    #[serde(default)]
    pub crash_patterns: Vec<CrashPattern>,
    /// `first` / `last` analysis timestamps.
    #[serde(default)]
    pub time_range: BTreeMap<String, String>,
}
