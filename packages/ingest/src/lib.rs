#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library orchestrating full pipeline runs: geography catalog, weekly
//! cache reconciliation, and the hierarchical merge.
//!
//! One run processes its location/disease pairs strictly sequentially —
//! each pair completes its own read-modify-write cache cycle before the
//! next begins, so nothing but the read-only catalog is shared across
//! pairs.

use std::path::{Path, PathBuf};
use std::str::FromStr as _;

use arbo_map_fetch::{FetchClient, FetchError, ResponseFormat};
use arbo_map_geography::catalog::{self, CatalogRequest};
use arbo_map_geography_models::Municipality;
use arbo_map_layout::{DataLayout, ensure_dir};
use arbo_map_merge::city::merge_city;
use arbo_map_merge::rollup::{merge_country, merge_state, unique_states};
use arbo_map_surveillance::api::AlertApi;
use arbo_map_surveillance::reconcile::{last_elapsed_week, reconcile};
use arbo_map_surveillance::{FetchPlan, WeeklySource};
use arbo_map_surveillance_models::Disease;
use serde::Deserialize;

/// Errors that can occur while orchestrating a run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// An HTTP client could not be built or a fetch failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The geography catalog could not be built or loaded.
    #[error("Geography error: {0}")]
    Geography(#[from] arbo_map_geography::GeoError),

    /// A cache reconciliation step failed.
    #[error("Surveillance error: {0}")]
    Surveillance(#[from] arbo_map_surveillance::SurveillanceError),

    /// A merge step failed.
    #[error("Merge error: {0}")]
    Merge(#[from] arbo_map_merge::MergeError),
}

/// How a sweep responds to a per-item failure.
///
/// Catalog failures are always fatal regardless of policy — nothing can
/// run without the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failed location/disease pair and continue with its siblings.
    #[default]
    SkipAndLog,
    /// Abort the sweep on the first failure.
    Abort,
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Country whose municipalities are processed.
    pub country: String,
    /// Target epidemiological year.
    pub year: i32,
    /// First week of the configured range.
    pub ew_start: u32,
    /// Last week of the configured range.
    pub ew_end: u32,
    /// Response format requested from both APIs.
    pub format: String,
    /// Diseases reconciled for every location.
    pub diseases: Vec<Disease>,
    /// Optional state-code filter (empty keeps all states).
    pub list_uf: Vec<String>,
    /// Optional municipality-name filter (empty keeps all).
    pub list_city: Vec<String>,
    /// Collapse per-location directories to their state directory.
    pub state_granularity: bool,
    /// Root of the data tree.
    pub data_dir: PathBuf,
    /// Geography reference API endpoint.
    pub ibge_api: String,
    /// Surveillance alert API endpoint.
    pub infodengue_api: String,
    /// Retry budget for the one-off catalog build.
    pub catalog_retries: u32,
    /// Retry budget for each alert fetch.
    pub alert_retries: u32,
    /// Backoff factor in seconds shared by both clients.
    pub backoff_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            country: "Brasil".to_owned(),
            year: 2024,
            ew_start: 1,
            ew_end: 53,
            format: "json".to_owned(),
            diseases: Disease::all().to_vec(),
            list_uf: Vec::new(),
            list_city: Vec::new(),
            state_granularity: false,
            data_dir: PathBuf::from("data"),
            ibge_api: "https://servicodados.ibge.gov.br/api/v1/localidades/distritos".to_owned(),
            infodengue_api: "https://info.dengue.mat.br/api/alertcity".to_owned(),
            catalog_retries: 5,
            alert_retries: 3,
            backoff_secs: 60,
        }
    }
}

impl RunConfig {
    /// Loads a configuration from a TOML file. Missing keys fall back to
    /// the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, IngestError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// The data-tree layout this configuration addresses.
    #[must_use]
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir, &self.country, self.state_granularity)
    }

    /// The catalog build/load request for this run.
    #[must_use]
    pub fn catalog_request(&self) -> CatalogRequest {
        CatalogRequest {
            country: self.country.clone(),
            api_url: self.ibge_api.clone(),
            states: self.list_uf.clone(),
            cities: self.list_city.clone(),
        }
    }

    /// Parses the configured response format.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] for formats no client supports.
    pub fn response_format(&self) -> Result<ResponseFormat, IngestError> {
        ResponseFormat::from_str(&self.format)
            .map_err(|_| FetchError::UnsupportedFormat(self.format.clone()).into())
    }
}

/// Counters reported by a surveillance sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Location/disease pairs processed.
    pub processed: u64,
    /// Pairs whose cache file changed.
    pub changed: u64,
    /// Pairs skipped after a failure (always zero under
    /// [`FailurePolicy::Abort`]).
    pub failed: u64,
}

/// Counters reported by a merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// City artifacts written.
    pub cities: u64,
    /// Locations skipped for lack of raw data.
    pub cities_skipped: u64,
    /// State artifacts written.
    pub states: u64,
    /// Whether the country artifact was written.
    pub country: bool,
    /// Merge steps that failed and were skipped.
    pub failed: u64,
}

/// Loads (building if needed) the catalog and returns its municipalities.
///
/// # Errors
///
/// Returns [`IngestError`] if the catalog cannot be built or loaded — this
/// is fatal for any run.
pub async fn load_municipalities(config: &RunConfig) -> Result<Vec<Municipality>, IngestError> {
    let client = FetchClient::new(
        config.response_format()?,
        config.catalog_retries,
        config.backoff_secs,
    )?;
    let frame = catalog::load_or_build(&client, &config.layout(), &config.catalog_request()).await?;
    Ok(catalog::municipalities(&frame))
}

/// Expands the catalog into `(municipality, disease)` work items, sorted
/// ascending by `(geocode, disease)`.
#[must_use]
pub fn expand_work_items(
    municipalities: &[Municipality],
    diseases: &[Disease],
) -> Vec<(Municipality, Disease)> {
    let mut items = Vec::new();
    for municipality in municipalities {
        for disease in diseases {
            items.push((municipality.clone(), *disease));
        }
    }
    items.sort_by(|a, b| {
        (a.0.geocode, a.1.to_string()).cmp(&(b.0.geocode, b.1.to_string()))
    });
    items
}

/// Reconciles the weekly cache of every configured location/disease pair,
/// strictly in sequence.
///
/// # Errors
///
/// Returns [`IngestError`] on catalog failure, or — under
/// [`FailurePolicy::Abort`] — on the first failed pair.
pub async fn sync_surveillance(
    config: &RunConfig,
    policy: FailurePolicy,
) -> Result<SyncStats, IngestError> {
    let municipalities = load_municipalities(config).await?;
    let layout = config.layout();

    let client = FetchClient::new(
        config.response_format()?,
        config.alert_retries,
        config.backoff_secs,
    )?;
    let api = AlertApi::new(client, &config.infodengue_api);

    let today = chrono::Local::now().date_naive();
    let plan = FetchPlan {
        year: config.year,
        ew_start: config.ew_start,
        ew_end: config.ew_end,
        elapsed_week: last_elapsed_week(today, config.year),
    };
    log::info!(
        "Reconciling year {} weeks {}-{} (elapsed week {})",
        plan.year,
        plan.ew_start,
        plan.ew_end,
        plan.elapsed_week
    );

    let items = expand_work_items(&municipalities, &config.diseases);
    log::info!("{} location/disease pairs to reconcile", items.len());

    let mut stats = SyncStats::default();
    for (municipality, disease) in &items {
        stats.processed += 1;
        match reconcile_one(&api, &layout, municipality, *disease, &plan).await {
            Ok(changed) => {
                if changed {
                    stats.changed += 1;
                }
            }
            Err(e) => match policy {
                FailurePolicy::SkipAndLog => {
                    log::error!(
                        "[{disease}] {}: reconciliation failed, skipping: {e}",
                        municipality.geocode
                    );
                    stats.failed += 1;
                }
                FailurePolicy::Abort => return Err(e),
            },
        }
    }

    log::info!(
        "Sync complete: {} pairs processed, {} caches changed, {} failed",
        stats.processed,
        stats.changed,
        stats.failed
    );
    Ok(stats)
}

async fn reconcile_one<S: WeeklySource>(
    source: &S,
    layout: &DataLayout,
    municipality: &Municipality,
    disease: Disease,
    plan: &FetchPlan,
) -> Result<bool, IngestError> {
    ensure_dir(&layout.location_dir(&municipality.mesorregiao_uf, municipality.geocode))?;
    let cache_file = layout.cache_file(
        &municipality.mesorregiao_uf,
        municipality.geocode,
        plan.year,
    );
    let outcome = reconcile(source, &cache_file, municipality.geocode, disease, plan).await?;
    Ok(outcome.changed())
}

/// Runs the three merge levels over the configured locations.
///
/// # Errors
///
/// Returns [`IngestError`] on catalog failure, or — under
/// [`FailurePolicy::Abort`] — on the first failed merge step.
pub async fn run_merge(
    config: &RunConfig,
    policy: FailurePolicy,
) -> Result<MergeStats, IngestError> {
    let municipalities = load_municipalities(config).await?;
    let layout = config.layout();
    let mut stats = MergeStats::default();

    for municipality in &municipalities {
        match merge_city(&layout, municipality) {
            Ok(Some(_)) => stats.cities += 1,
            Ok(None) => stats.cities_skipped += 1,
            Err(e) => match policy {
                FailurePolicy::SkipAndLog => {
                    log::error!(
                        "{} ({}): city merge failed, skipping: {e}",
                        municipality.municipio,
                        municipality.mesorregiao_uf
                    );
                    stats.failed += 1;
                }
                FailurePolicy::Abort => return Err(e.into()),
            },
        }
    }

    let states = unique_states(&municipalities);
    for uf in &states {
        match merge_state(&layout, uf, &municipalities) {
            Ok(Some(_)) => stats.states += 1,
            Ok(None) => {}
            Err(e) => match policy {
                FailurePolicy::SkipAndLog => {
                    log::error!("{uf}: state merge failed, skipping: {e}");
                    stats.failed += 1;
                }
                FailurePolicy::Abort => return Err(e.into()),
            },
        }
    }

    match merge_country(&layout, &states) {
        Ok(written) => stats.country = written.is_some(),
        Err(e) => match policy {
            FailurePolicy::SkipAndLog => {
                log::error!("Country merge failed, skipping: {e}");
                stats.failed += 1;
            }
            FailurePolicy::Abort => return Err(e.into()),
        },
    }

    log::info!(
        "Merge complete: {} city artifacts ({} skipped), {} state artifacts, country artifact: {}",
        stats.cities,
        stats.cities_skipped,
        stats.states,
        if stats.country { "written" } else { "skipped" }
    );
    Ok(stats)
}
