//! corelens-core
//!
//! Core library for post-mortem analysis of database core dumps.
//!
//! This crate turns the batch transcript of a debugger session (plus the
//! `file` probe output) into a structured crash model, clusters recurring
//! crashes across many dumps, and renders or persists the results.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends; the transcript parsers are pure functions
//! over text and never touch the filesystem or spawn processes.

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod parser;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
