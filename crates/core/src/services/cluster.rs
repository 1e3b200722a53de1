//! Cross-dump clustering.
//!
//! A crash signature is the signal name plus the first three frames of the
//! crashed thread that are not runtime frames (system symbols, the signal
//! trampoline, `??`, thread entry points). Signatures shared by at least two dumps
//! become `CrashPattern`s; the distributions cover every input.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use sha2::{Digest, Sha256};

use crate::model::{CoreAnalysis, CoreComparison, CrashPattern, StackFrame};
use crate::parser::roles::is_runtime_frame;

/// Number of non-runtime frames in a signature.
pub const SIGNATURE_DEPTH: usize = 3;

/// Frames used for clustering: the crashed thread's backtrace, or the flat
/// stack trace when no thread is flagged as crashed.
fn signature_frames(analysis: &CoreAnalysis) -> &[StackFrame] {
    match analysis.crashed_thread() {
        Some(thread) if !thread.backtrace.is_empty() => &thread.backtrace,
        _ => &analysis.stack_trace,
    }
}

/// Signal name and leading non-runtime frame functions.
pub fn crash_signature(analysis: &CoreAnalysis) -> (String, Vec<String>) {
    let frames = signature_frames(analysis)
        .iter()
        .map(|f| f.function.as_str())
        .filter(|name| !is_runtime_frame(name))
        .take(SIGNATURE_DEPTH)
        .map(str::to_string)
        .collect();
    (analysis.signal_info.signal_name.clone(), frames)
}

/// Short stable id of a signature: 12 hex chars of its SHA-256.
pub fn signature_id(signal: &str, frames: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signal.as_bytes());
    for frame in frames {
        hasher.update(b"|");
        hasher.update(frame.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

pub fn compare_cores(analyses: &[CoreAnalysis]) -> CoreComparison {
    let mut comparison = CoreComparison { total_cores: analyses.len(), ..Default::default() };

    // Insertion order of `groups` is discovery order.
    let mut groups: Vec<((String, Vec<String>), Vec<String>)> = Vec::new();
    for analysis in analyses {
        let signal = analysis.signal_info.signal_name.clone();
        *comparison.common_signals.entry(signal).or_insert(0) += 1;
        for frame in signature_frames(analysis) {
            if !is_runtime_frame(&frame.function) {
                *comparison.common_functions.entry(frame.function.clone()).or_insert(0) += 1;
            }
        }

        let signature = crash_signature(analysis);
        match groups.iter_mut().find(|(sig, _)| *sig == signature) {
            Some((_, files)) => files.push(analysis.core_file.clone()),
            None => groups.push((signature, vec![analysis.core_file.clone()])),
        }
    }

    let mut patterns: Vec<CrashPattern> = groups
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|((signal, frames), files)| CrashPattern {
            signature_id: signature_id(&signal, &frames),
            signal,
            stack_signature: frames,
            occurrence_count: files.len(),
            affected_core_files: files,
        })
        .collect();
    // Stable: ties keep discovery order.
    patterns.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));
    comparison.crash_patterns = patterns;

    comparison.time_range = time_range(analyses);
    comparison
}

/// `first` / `last` analysis timestamps. Unparseable timestamps are skipped.
fn time_range(analyses: &[CoreAnalysis]) -> BTreeMap<String, String> {
    let times: Vec<DateTime<FixedOffset>> = analyses
        .iter()
        .filter_map(|a| DateTime::parse_from_rfc3339(&a.timestamp).ok())
        .collect();
    let mut range = BTreeMap::new();
    if let (Some(first), Some(last)) = (times.iter().min(), times.iter().max()) {
        range.insert("first".to_string(), first.to_rfc3339());
        range.insert("last".to_string(), last.to_rfc3339());
    }
    range
}
