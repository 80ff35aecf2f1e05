//! pahole-core
//!
//! Core library for finding C/C++ structures whose members could be reordered
//! to remove padding.
//!
//! This crate defines the layout model, the configuration model, the object
//! enumerator, the `pahole` adapter, the output parser, the classifier and the
//! report writer.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends (CLI, build-system hooks, etc.).

pub mod config;
pub mod model;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
