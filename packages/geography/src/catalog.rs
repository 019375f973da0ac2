//! Catalog building: bulk reference fetch, projection, and local cache.

use arbo_map_fetch::FetchClient;
use arbo_map_geography_models::{
    GEOCODE, IBGE_PROJECTION, MUNICIPALITY, Municipality, STATE, catalog_columns,
};
use arbo_map_layout::{DataLayout, ensure_dir, has_content};
use arbo_map_table::Frame;
use serde_json::Value;

use crate::GeoError;

/// Inputs for building or loading the geography catalog.
#[derive(Debug, Clone)]
pub struct CatalogRequest {
    /// Country the catalog covers.
    pub country: String,
    /// Reference-API endpoint returning the full district hierarchy.
    pub api_url: String,
    /// Keep only these state codes when non-empty.
    pub states: Vec<String>,
    /// Keep only these municipality names when non-empty.
    pub cities: Vec<String>,
}

/// Loads the catalog file, building it from the reference API first when it
/// is absent or empty, then applies the state and municipality filters.
///
/// An existing catalog is read as-is — no freshness check, no re-fetch.
///
/// # Errors
///
/// Returns [`GeoError`] if the catalog cannot be built or read. A build
/// failure writes no partial catalog.
pub async fn load_or_build(
    client: &FetchClient,
    layout: &DataLayout,
    request: &CatalogRequest,
) -> Result<Frame, GeoError> {
    ensure_dir(&layout.catalog_dir())?;
    let path = layout.catalog_file();

    if has_content(&path) {
        log::info!("Reading catalog file at '{}'", path.display());
    } else {
        log::info!("Catalog file not found at '{}'", path.display());
        let reference = client.get_table(&request.api_url).await?;
        let catalog = project_reference(&reference, &request.country)?;
        log::info!(
            "Creating catalog file at '{}' ({} municipalities)",
            path.display(),
            catalog.len()
        );
        catalog.write_csv(&path)?;
    }

    let mut catalog = Frame::read_csv(&path)?;

    if !request.states.is_empty() {
        log::info!("Filtering catalog to states {:?}", request.states);
        catalog = catalog.filter_in(STATE, &request.states);
    }
    if !request.cities.is_empty() {
        log::info!("Filtering catalog to municipalities {:?}", request.cities);
        catalog = catalog.filter_in(MUNICIPALITY, &request.cities);
    }

    Ok(catalog)
}

/// Projects a flattened reference response onto the canonical catalog
/// schema: the fixed hierarchy fields renamed, duplicate geocodes dropped
/// (first occurrence kept), and `country` prepended.
///
/// # Errors
///
/// Returns [`GeoError`] if the response lacks any projected field.
pub fn project_reference(reference: &Frame, country: &str) -> Result<Frame, GeoError> {
    let source_columns: Vec<&str> = IBGE_PROJECTION.iter().map(|(source, _)| *source).collect();
    let mut catalog = reference.select(&source_columns)?;
    catalog.rename_columns(IBGE_PROJECTION);
    catalog.dedup_by(&[GEOCODE]);
    catalog.insert_const(0, "country", &Value::String(country.to_owned()));
    debug_assert_eq!(catalog.columns(), catalog_columns());
    Ok(catalog)
}

/// The typed municipalities of a catalog frame, in row order. Rows without
/// a usable geocode are skipped.
#[must_use]
pub fn municipalities(catalog: &Frame) -> Vec<Municipality> {
    catalog.rows().iter().filter_map(Municipality::from_row).collect()
}
