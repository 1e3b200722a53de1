//! Transcript parsers.
//!
//! Each submodule owns one grammar of the gdb batch transcript (or the
//! `file` probe line) and is pure: text in, typed records out. A line that
//! does not match a grammar is ignored; nothing in here returns an error.

pub mod frames;
pub mod libraries;
pub mod primitives;
pub mod process;
pub mod registers;
pub mod roles;
pub mod signal;
pub mod threads;

pub use frames::{dedup_frames, parse_frame, parse_stack_trace};
pub use libraries::{categorize_library, find_address_library, parse_shared_libraries};
pub use process::parse_basic_info;
pub use registers::parse_registers;
pub use roles::{
    classify_role, find_key_function, is_runtime_frame, is_system_function, thread_summary,
};
pub use signal::{decode_signal, parse_signal_info, signal_name};
pub use threads::{dedup_threads, parse_threads};
