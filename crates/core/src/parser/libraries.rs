//! Shared library table (`info sharedlibrary`) parsing and classification.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::LibraryInfo;
use crate::parser::primitives::{basename, normalize_hex};

/// Category label, human description and path pattern. Order is precedence.
const CATEGORY_TABLE: &[(&str, &str, &str)] = &[
    ("Core", "Database Core Libraries", r"libpostgres\.so"),
    ("Extension", "Database Extensions", r"/postgresql/.*\.so"),
    ("Interconnect", "Database Interconnect", r"interconnect\.so"),
    ("Compression", "Compression Libraries", r"(zlib|libz\.so|lz4|zstd|bzip2|libbz2)"),
    ("Security", "Security Libraries", r"(ssl|crypto|pam|krb5|gssapi|ldap|sasl)"),
    ("System", "System Libraries", r"^/lib"),
    ("Runtime", "Language Runtime", r"(libc|libstdc\+\+|libgcc)"),
];

pub const OTHER_CATEGORY: &str = "Other";

static CATEGORY_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    CATEGORY_TABLE
        .iter()
        .map(|(label, _, pattern)| {
            (Regex::new(pattern).expect("CATEGORY_TABLE regex pattern is valid"), *label)
        })
        .collect()
});

static LIBRARY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(0x[0-9a-fA-F]+)\s+(0x[0-9a-fA-F]+)\s+(\S+)(?:\s+\(\*\))?\s+(\S.*?)\s*$")
        .expect("LIBRARY_LINE regex pattern is valid")
});
static SO_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.so\.([0-9][0-9A-Za-z.]*)$").expect("SO_VERSION regex pattern is valid")
});
static NUMERIC_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9.]+$").expect("NUMERIC_COMPONENT regex pattern is valid"));

/// Parses one table row; header rows and rows without an address range are
/// skipped.
pub fn parse_library_line(line: &str) -> Option<LibraryInfo> {
    let caps = LIBRARY_LINE.captures(line)?;
    let status = &caps[3];
    let path = caps[4].trim();
    if status.starts_with("0x") || !path.contains(".so") {
        return None;
    }
    Some(LibraryInfo {
        name: path.to_string(),
        start_addr: caps[1].to_string(),
        end_addr: caps[2].to_string(),
        version: library_version(path),
        category: categorize_library(path).to_string(),
        is_loaded: status == "Yes",
    })
}

pub fn parse_shared_libraries(transcript: &str) -> Vec<LibraryInfo> {
    transcript.lines().filter_map(parse_library_line).collect()
}

/// First matching category, `Other` when none does.
pub fn categorize_library(path: &str) -> &'static str {
    CATEGORY_RULES
        .iter()
        .find(|(re, _)| re.is_match(path))
        .map(|(_, label)| *label)
        .unwrap_or(OTHER_CATEGORY)
}

pub fn category_description(category: &str) -> &str {
    CATEGORY_TABLE
        .iter()
        .find(|(label, _, _)| *label == category)
        .map(|(_, desc, _)| *desc)
        .unwrap_or("Other Libraries")
}

/// `libcrypto.so.1.1.1f` -> `1.1.1f`; `libboost_system-mt-1.74.so` -> `1.74`.
pub fn library_version(path: &str) -> Option<String> {
    if let Some(caps) = SO_VERSION.captures(path) {
        return Some(caps[1].to_string());
    }
    let name = basename(path);
    let stem = name.split(".so").next().unwrap_or(&name);
    stem.split('-')
        .find(|part| NUMERIC_COMPONENT.is_match(part) && part.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Library whose `[start, end]` range contains `address`. Addresses are
/// compared as normalized hex strings so malformed input never panics.
pub fn find_address_library<'a>(
    address: &str,
    libraries: &'a [LibraryInfo],
) -> Option<&'a LibraryInfo> {
    let addr = normalize_hex(address)?;
    libraries.iter().find(|lib| {
        match (normalize_hex(&lib.start_addr), normalize_hex(&lib.end_addr)) {
            (Some(start), Some(end)) => addr >= start && addr <= end,
            _ => false,
        }
    })
}

/// Aggregate view of the library table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LibraryAnalysis {
    pub category_counts: BTreeMap<String, usize>,
    pub unloaded_libraries: Vec<String>,
    /// Parent directory -> Core/Extension library file names.
    pub engine_components: BTreeMap<String, Vec<String>>,
}

pub fn analyze_libraries(libraries: &[LibraryInfo]) -> LibraryAnalysis {
    let mut analysis = LibraryAnalysis::default();
    for lib in libraries {
        *analysis.category_counts.entry(lib.category.clone()).or_insert(0) += 1;
        if !lib.is_loaded {
            analysis.unloaded_libraries.push(lib.name.clone());
        }
        if lib.category == "Core" || lib.category == "Extension" {
            let component = Path::new(&lib.name)
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            analysis.engine_components.entry(component).or_default().push(basename(&lib.name));
        }
    }
    analysis
}

/// Category labels in table order followed by `Other`.
pub fn category_order() -> impl Iterator<Item = &'static str> {
    CATEGORY_TABLE.iter().map(|(label, _, _)| *label).chain(std::iter::once(OTHER_CATEGORY))
}
