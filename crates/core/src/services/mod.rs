//! Services: the pipeline stages, leaf-first.
//!
//! - `enumerate`: glob expansion and blacklist filtering of object files
//! - `backends`: adapters for layout tools (pahole)
//! - `parser`: layout dump → structure records
//! - `classify`: ignore filtering and optimal/packable classification
//! - `analysis`: the per-object batch runner
//! - `report`: aggregation and dump rendering

pub mod analysis;
pub mod backends;
pub mod classify;
pub mod enumerate;
pub mod parser;
pub mod report;
