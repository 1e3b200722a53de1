//! Stateless text-fragment extractors shared by the parsers.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static HEX_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("HEX_ADDRESS regex pattern is valid"));

/// First `0x...` token in `text`.
pub fn first_address(text: &str) -> Option<&str> {
    HEX_ADDRESS.find(text).map(|m| m.as_str())
}

/// Lenient integer parse; surrounding whitespace is ignored.
pub fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Normalizes a hex address for ordered string comparison: lowercase, no
/// `0x` prefix, left-padded to 16 digits. Returns `None` for anything that
/// is not a hex number of at most 64 bits.
pub fn normalize_hex(addr: &str) -> Option<String> {
    let trimmed = addr.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 16 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{:0>16}", digits.to_ascii_lowercase()))
}

/// Last path component, or the input itself when it has none.
pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Splits `a=1, b=2` into pairs. Entries without `=` are dropped; values keep
/// everything after the first `=`.
pub fn parse_assignments(text: &str) -> Vec<(String, String)> {
    text.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Index of the parenthesis closing the one at `open`; `None` when the line
/// is truncated before it closes.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text.get(open..)?.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}
