//! The three-phase cache reconciliation state machine.
//!
//! Per (location, disease) and per run:
//!
//! 1. **Bootstrap** — no cache file yet: one bulk fetch over the configured
//!    week range. An empty response creates no file, so the pair stays
//!    uncached until the source has data.
//! 2. **Gap phase** — backfill every week missing from
//!    `[ew_start, max cached]` with a single-week fetch each, re-reading
//!    the cache before every append so appends accumulate.
//! 3. **Dynamic phase** — extend the series up to the last fully elapsed
//!    week of the target year.
//!
//! Every append rewrites the whole file: tag, concat, sort, drop all-null
//! columns, overwrite. There is no in-place append and no locking; the
//! data tree belongs to a single process.

use std::collections::BTreeSet;
use std::path::Path;

use arbo_map_layout::has_content;
use arbo_map_surveillance_models::{Disease, EpiWeek};
use arbo_map_table::{Frame, SortKey, as_i64, cell_to_string};
use chrono::{Datelike as _, NaiveDate};
use serde_json::Value;

use crate::{FetchPlan, SurveillanceError, WeeklySource};

pub use arbo_map_surveillance_models::{DISEASE, GEOCODE, SE};

/// What one reconciliation pass did for a (location, disease) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// A new cache file was created by the bootstrap fetch.
    pub bootstrapped: bool,
    /// Interior weeks that were backfilled with data.
    pub gap_weeks: Vec<u32>,
    /// The `(start, end)` range appended by the dynamic phase.
    pub extension: Option<(u32, u32)>,
}

impl ReconcileOutcome {
    /// `true` when the pass changed the cache file.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.bootstrapped || !self.gap_weeks.is_empty() || self.extension.is_some()
    }
}

/// The last fully elapsed week of `target_year` as of `today`.
///
/// Within the target year this is the run date's ISO week minus one — the
/// current week is still being reported and is never requested. Once the
/// calendar has moved past the target year the whole range (53) counts as
/// elapsed.
#[must_use]
pub fn last_elapsed_week(today: NaiveDate, target_year: i32) -> u32 {
    if today.year() > target_year {
        53
    } else {
        today.iso_week().week().saturating_sub(1)
    }
}

/// Week numbers already cached for `disease`, at or after `ew_start`.
///
/// Weeks are the two-digit component of the stored `SE` encoding.
#[must_use]
pub fn cached_weeks(cache: &Frame, disease: Disease, ew_start: u32) -> BTreeSet<u32> {
    let disease = disease.to_string();
    cache
        .rows()
        .iter()
        .filter(|row| {
            row.get(DISEASE)
                .is_some_and(|cell| cell_to_string(cell) == disease)
        })
        .filter_map(|row| row.get(SE).and_then(as_i64))
        .map(|se| EpiWeek::decode(se).week)
        .filter(|week| *week >= ew_start)
        .collect()
}

/// Gap-phase input: the highest cached week and the interior weeks missing
/// below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapReport {
    /// Highest cached week number, when any week is cached.
    pub max_cached: Option<u32>,
    /// Weeks of `[ew_start, max_cached]` absent from the cache, ascending.
    pub missing: Vec<u32>,
}

/// Computes the gap report for one disease from its cached week set.
///
/// A cache already reaching `ew_end` has no gaps by definition; otherwise
/// every week of `[ew_start, max_cached]` not in the set is missing.
#[must_use]
pub fn missing_weeks(cached: &BTreeSet<u32>, ew_start: u32, ew_end: u32) -> GapReport {
    let Some(&max_cached) = cached.iter().next_back() else {
        return GapReport::default();
    };
    let missing = if max_cached == ew_end {
        Vec::new()
    } else {
        (ew_start..=max_cached)
            .filter(|week| !cached.contains(week))
            .collect()
    };
    GapReport {
        max_cached: Some(max_cached),
        missing,
    }
}

/// The dynamic-phase fetch range, if any: the full range when the disease
/// has no cached rows, the tail `[max+1, elapsed]` when the cache stops
/// short of the last elapsed week, nothing once it has caught up.
#[must_use]
pub const fn extension_range(
    max_cached: Option<u32>,
    ew_start: u32,
    elapsed_week: u32,
) -> Option<(u32, u32)> {
    match max_cached {
        None => {
            if elapsed_week >= ew_start {
                Some((ew_start, elapsed_week))
            } else {
                None
            }
        }
        Some(max) => {
            if max < elapsed_week {
                Some((max + 1, elapsed_week))
            } else {
                None
            }
        }
    }
}

/// Runs one reconciliation pass for `(geocode, disease)` against
/// `cache_file`.
///
/// # Errors
///
/// Returns [`SurveillanceError`] if a fetch exhausts its retries or the
/// cache file cannot be read or written. The cache is only ever replaced
/// wholesale after a successful merge, so a failed pass leaves the previous
/// contents intact.
pub async fn reconcile<S: WeeklySource>(
    source: &S,
    cache_file: &Path,
    geocode: i64,
    disease: Disease,
    plan: &FetchPlan,
) -> Result<ReconcileOutcome, SurveillanceError> {
    let mut outcome = ReconcileOutcome::default();

    if !has_content(cache_file) {
        let response = source
            .fetch_weeks(disease, geocode, plan.ew_start, plan.ew_end, plan.year)
            .await?;
        if append_fetch(cache_file, response, disease, geocode)? {
            log::info!(
                "[{disease}] {geocode}: cache created at '{}'",
                cache_file.display()
            );
            outcome.bootstrapped = true;
        } else {
            log::info!(
                "[{disease}] {geocode}: no data for weeks {}-{}, cache not created",
                plan.ew_start,
                plan.ew_end
            );
        }
        return Ok(outcome);
    }

    let cache = Frame::read_csv(cache_file)?;
    log::info!(
        "[{disease}] {geocode}: cache '{}' loaded ({} rows)",
        cache_file.display(),
        cache.len()
    );

    let cached = cached_weeks(&cache, disease, plan.ew_start);
    let report = missing_weeks(&cached, plan.ew_start, plan.ew_end);
    if report.missing.is_empty() {
        log::info!("[{disease}] {geocode}: no missing weeks to request");
    }
    for week in report.missing {
        log::info!("[{disease}] {geocode}: requesting missing week {week}");
        let response = source
            .fetch_weeks(disease, geocode, week, week, plan.year)
            .await?;
        if append_fetch(cache_file, response, disease, geocode)? {
            outcome.gap_weeks.push(week);
        }
    }

    // The dynamic phase recomputes from the file so gap appends count.
    let cache = Frame::read_csv(cache_file)?;
    let cached = cached_weeks(&cache, disease, plan.ew_start);
    match extension_range(
        cached.iter().next_back().copied(),
        plan.ew_start,
        plan.elapsed_week,
    ) {
        Some((start, end)) => {
            log::info!("[{disease}] {geocode}: requesting dynamic range {start}-{end}");
            let response = source
                .fetch_weeks(disease, geocode, start, end, plan.year)
                .await?;
            if append_fetch(cache_file, response, disease, geocode)? {
                outcome.extension = Some((start, end));
            }
        }
        None => {
            log::info!("[{disease}] {geocode}: no dynamic data to request");
        }
    }

    Ok(outcome)
}

/// Merges a fetch response into the cache file.
///
/// An empty response leaves the cache untouched and returns `false`.
/// Otherwise the rows are tagged with `(disease, geocode)`, concatenated
/// onto the freshly re-read cache, sorted by `(disease asc, SE desc)`,
/// stripped of all-null columns, and written back wholesale.
///
/// # Errors
///
/// Returns [`SurveillanceError`] if the cache cannot be read or written.
pub fn append_fetch(
    cache_file: &Path,
    response: Frame,
    disease: Disease,
    geocode: i64,
) -> Result<bool, SurveillanceError> {
    if response.is_empty() {
        log::info!("[{disease}] {geocode}: no new data");
        return Ok(false);
    }

    let mut response = response;
    response.insert_const(0, GEOCODE, &Value::from(geocode));
    response.insert_const(0, DISEASE, &Value::String(disease.to_string()));

    let mut merged = if has_content(cache_file) {
        Frame::concat(vec![Frame::read_csv(cache_file)?, response])
    } else {
        response
    };
    merged.sort_by(&[SortKey::asc(DISEASE), SortKey::desc(SE)]);
    merged.drop_empty_columns();
    merged.write_csv(cache_file)?;

    log::info!(
        "[{disease}] {geocode}: cache '{}' updated ({} rows)",
        cache_file.display(),
        merged.len()
    );
    Ok(true)
}
