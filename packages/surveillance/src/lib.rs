#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Gap-reconciling weekly surveillance cache fetcher.
//!
//! For each (municipality, disease) pair this crate maintains a local
//! weekly time-series cache file and reconciles it against the remote
//! alert source: bootstrapping when no cache exists, backfilling interior
//! week gaps one week at a time, and extending the series up to the most
//! recently elapsed week. Reconciliation is idempotent: with no new remote
//! data a second run issues no fetches and rewrites nothing.

pub mod api;
pub mod reconcile;

use arbo_map_surveillance_models::Disease;
use arbo_map_table::Frame;

/// Errors that can occur during surveillance reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum SurveillanceError {
    /// A remote fetch failed beyond its retry budget.
    #[error("Fetch error: {0}")]
    Fetch(#[from] arbo_map_fetch::FetchError),

    /// A frame operation failed.
    #[error("Table error: {0}")]
    Table(#[from] arbo_map_table::TableError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The week range a run reconciles against, fixed once per run.
#[derive(Debug, Clone, Copy)]
pub struct FetchPlan {
    /// Target epidemiological year.
    pub year: i32,
    /// First week of the configured range.
    pub ew_start: u32,
    /// Last week of the configured range.
    pub ew_end: u32,
    /// Last fully elapsed week of the target year, from
    /// [`reconcile::last_elapsed_week`].
    pub elapsed_week: u32,
}

/// A remote source of weekly surveillance records.
///
/// The single seam between reconciliation logic and the network: the alert
/// API implements it over HTTP, tests implement it over fixtures.
pub trait WeeklySource: Send + Sync {
    /// Fetches all records for `disease` at `geocode` spanning epidemiological
    /// weeks `ew_start..=ew_end` of `year`. An empty frame means the source
    /// has no data for that span.
    ///
    /// # Errors
    ///
    /// Returns [`SurveillanceError`] if the fetch fails.
    fn fetch_weeks(
        &self,
        disease: Disease,
        geocode: i64,
        ew_start: u32,
        ew_end: u32,
        year: i32,
    ) -> impl std::future::Future<Output = Result<Frame, SurveillanceError>> + Send;
}
