#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geography catalog construction from the IBGE reference API.
//!
//! Downloads the full administrative hierarchy for a country in a single
//! bulk call, flattens it to one row per municipality, and caches the
//! result as the catalog file every downstream stage reads. A catalog that
//! cannot be built is fatal for the run: nothing else knows which
//! locations exist.

pub mod catalog;

use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Fetching the reference API failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] arbo_map_fetch::FetchError),

    /// A frame operation failed.
    #[error("Table error: {0}")]
    Table(#[from] arbo_map_table::TableError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
