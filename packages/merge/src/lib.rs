#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hierarchical merge of weekly caches into aggregate artifacts.
//!
//! Three stacked fan-in levels: per-location raw caches merge into one
//! enriched city artifact, city artifacts roll up per state, and state
//! artifacts roll up into a single country artifact. Missing inputs are
//! logged and skipped at every level — aggregation proceeds with whatever
//! exists, and no empty artifact is ever written.

pub mod city;
pub mod rollup;

use thiserror::Error;

/// Errors that can occur while merging artifacts.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A frame operation failed.
    #[error("Table error: {0}")]
    Table(#[from] arbo_map_table::TableError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
