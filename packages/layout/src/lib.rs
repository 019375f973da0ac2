#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! On-disk path convention for the arbo-map data tree.
//!
//! The directory layout is the wire format between pipeline stages — there
//! is no index file. Every path is derived from `(country, state, geocode)`:
//!
//! ```text
//! <root>/<country>/_ibge/ibge_data.csv                     geography catalog
//! <root>/<country>/<uf>/<geocode>/aedes_data_<year>.csv    raw weekly cache
//! <root>/<country>/<uf>/<geocode>/infodengue_data.csv      city artifact
//! <root>/<country>/<uf>/infodengue_data_<uf>.csv           state artifact
//! <root>/<country>/infodengue_data_<country>.csv           country artifact
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory under the country root holding the geography catalog.
pub const CATALOG_DIR: &str = "_ibge";

/// File name of the geography catalog.
pub const CATALOG_FILE: &str = "ibge_data.csv";

/// File-name prefix of raw weekly cache files.
pub const CACHE_PREFIX: &str = "aedes";

/// Base name of merged artifacts at every level.
pub const ARTIFACT_BASE: &str = "infodengue_data";

/// Path builder for one country's data tree.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
    country: String,
    state_granularity: bool,
}

impl DataLayout {
    /// Creates a layout rooted at `root` for `country`.
    ///
    /// With `state_granularity` set, location directories collapse to their
    /// state directory (one shared tree per state instead of one per
    /// municipality).
    #[must_use]
    pub fn new(root: &Path, country: &str, state_granularity: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            country: country.to_owned(),
            state_granularity,
        }
    }

    /// The country root directory.
    #[must_use]
    pub fn country_dir(&self) -> PathBuf {
        self.root.join(&self.country)
    }

    /// Directory holding the geography catalog.
    #[must_use]
    pub fn catalog_dir(&self) -> PathBuf {
        self.country_dir().join(CATALOG_DIR)
    }

    /// The geography catalog file.
    #[must_use]
    pub fn catalog_file(&self) -> PathBuf {
        self.catalog_dir().join(CATALOG_FILE)
    }

    /// Directory for one state's artifacts.
    #[must_use]
    pub fn state_dir(&self, uf: &str) -> PathBuf {
        self.country_dir().join(uf.to_lowercase())
    }

    /// Directory holding one location's cache and city artifact.
    #[must_use]
    pub fn location_dir(&self, uf: &str, geocode: i64) -> PathBuf {
        if self.state_granularity {
            self.state_dir(uf)
        } else {
            self.state_dir(uf).join(geocode.to_string())
        }
    }

    /// The raw weekly cache file for one location and target year.
    #[must_use]
    pub fn cache_file(&self, uf: &str, geocode: i64, year: i32) -> PathBuf {
        self.location_dir(uf, geocode)
            .join(format!("{CACHE_PREFIX}_data_{year}.csv"))
    }

    /// The merged city-level artifact for one location.
    #[must_use]
    pub fn city_artifact(&self, uf: &str, geocode: i64) -> PathBuf {
        self.location_dir(uf, geocode)
            .join(format!("{ARTIFACT_BASE}.csv"))
    }

    /// The merged state-level artifact.
    #[must_use]
    pub fn state_artifact(&self, uf: &str) -> PathBuf {
        self.state_dir(uf)
            .join(format!("{ARTIFACT_BASE}_{}.csv", uf.to_lowercase()))
    }

    /// The merged country-level artifact.
    #[must_use]
    pub fn country_artifact(&self) -> PathBuf {
        self.country_dir()
            .join(format!("{ARTIFACT_BASE}_{}.csv", self.country.to_lowercase()))
    }
}

/// Creates `dir` (and parents) when absent, logging which happened.
///
/// # Errors
///
/// Returns [`io::Error`] if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        log::debug!("Directory '{}' already exists", dir.display());
    } else {
        fs::create_dir_all(dir)?;
        log::info!("Directory '{}' created", dir.display());
    }
    Ok(())
}

/// `true` when `path` exists and contains at least one non-whitespace line.
///
/// A missing, empty, or whitespace-only file counts as absent — a partial
/// write must never be mistaken for a populated cache.
#[must_use]
pub fn has_content(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|content| content.lines().any(|line| !line.trim().is_empty()))
        .unwrap_or(false)
}
