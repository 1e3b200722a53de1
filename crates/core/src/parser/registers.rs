//! `info registers all` output.
//!
//! Only general purpose, segment and flag registers are kept, as the raw
//! value text after the name. Vector and x87 registers are ignored.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Registers;

static REGISTER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"^(fs_base|gs_base|[re](?:ax|bx|cx|dx|si|di|bp|sp|ip)|r(?:8|9|1[0-5])",
            r"|[re]?flags|[cdefgs]s)\s+(0x[0-9a-fA-F]+.*)",
        ),
    )
    .expect("REGISTER_LINE regex pattern is valid")
});

/// Register lines from `info registers all`. The first value seen for a
/// register wins, so later per-frame dumps never overwrite the crash state.
pub fn parse_registers(transcript: &str) -> Registers {
    let mut registers = Registers::new();
    for line in transcript.lines() {
        if let Some(caps) = REGISTER_LINE.captures(line) {
            registers.entry(caps[1].to_string()).or_insert_with(|| caps[2].trim().to_string());
        }
    }
    registers
}
