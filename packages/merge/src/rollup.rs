//! State- and country-level roll-ups: pure fan-ins over whatever lower
//! artifacts exist.

use std::path::PathBuf;

use arbo_map_geography_models::{Municipality, STATE};
use arbo_map_layout::{DataLayout, ensure_dir, has_content};
use arbo_map_surveillance_models::{DISEASE, GEOCODE};
use arbo_map_table::{Frame, SortKey};

use crate::MergeError;
use crate::city::{WEEK, YEAR};

/// State codes in first-seen order, one entry per state.
#[must_use]
pub fn unique_states(municipalities: &[Municipality]) -> Vec<String> {
    let mut states: Vec<String> = Vec::new();
    for municipality in municipalities {
        if !states.contains(&municipality.mesorregiao_uf) {
            states.push(municipality.mesorregiao_uf.clone());
        }
    }
    states
}

/// Rolls the existing city artifacts of `uf` up into one state artifact.
///
/// Locations without a city artifact are logged and excluded; a state with
/// none at all is skipped and returns `None`.
///
/// # Errors
///
/// Returns [`MergeError`] if an artifact cannot be read or written.
pub fn merge_state(
    layout: &DataLayout,
    uf: &str,
    municipalities: &[Municipality],
) -> Result<Option<PathBuf>, MergeError> {
    log::info!("Merging state {uf} data...");

    let mut frames = Vec::new();
    for municipality in municipalities {
        if municipality.mesorregiao_uf != uf {
            continue;
        }
        let path = layout.city_artifact(uf, municipality.geocode);
        if has_content(&path) {
            frames.push(Frame::read_csv(&path)?);
        } else {
            log::info!(
                "{} ({uf}) - no city artifact at '{}', excluded from state merge",
                municipality.municipio,
                path.display()
            );
        }
    }

    if frames.is_empty() {
        log::info!("{uf} - no city artifacts found, skipping state merge");
        return Ok(None);
    }

    let mut artifact = Frame::concat(frames);
    artifact.sort_by(&[
        SortKey::asc(GEOCODE),
        SortKey::asc(DISEASE),
        SortKey::desc(YEAR),
        SortKey::desc(WEEK),
    ]);

    ensure_dir(&layout.state_dir(uf))?;
    let path = layout.state_artifact(uf);
    artifact.write_csv(&path)?;
    log::info!("Merging state {uf} data done! ({} rows)", artifact.len());
    Ok(Some(path))
}

/// Rolls the existing state artifacts up into the single country artifact.
///
/// The state list is deduplicated first; states without an artifact are
/// logged and excluded. With no state artifacts at all nothing is written.
///
/// # Errors
///
/// Returns [`MergeError`] if an artifact cannot be read or written.
pub fn merge_country(layout: &DataLayout, states: &[String]) -> Result<Option<PathBuf>, MergeError> {
    let mut unique: Vec<&String> = Vec::new();
    for uf in states {
        if !unique.contains(&uf) {
            unique.push(uf);
        }
    }

    let mut frames = Vec::new();
    for uf in unique {
        let path = layout.state_artifact(uf);
        if has_content(&path) {
            frames.push(Frame::read_csv(&path)?);
        } else {
            log::info!("{uf} - no state artifact at '{}', excluded from country merge", path.display());
        }
    }

    if frames.is_empty() {
        log::info!("No state artifacts found, skipping country merge");
        return Ok(None);
    }

    let mut artifact = Frame::concat(frames);
    artifact.sort_by(&[
        SortKey::asc(STATE),
        SortKey::asc(GEOCODE),
        SortKey::asc(DISEASE),
        SortKey::desc(YEAR),
        SortKey::desc(WEEK),
    ]);

    ensure_dir(&layout.country_dir())?;
    let path = layout.country_artifact();
    artifact.write_csv(&path)?;
    log::info!(
        "Country merge done! ({} rows into '{}')",
        artifact.len(),
        path.display()
    );
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::enrich_city_frame;
    use arbo_map_surveillance_models::SE;
    use arbo_map_table::{Row, as_i64};
    use serde_json::json;

    fn municipality(geocode: i64, name: &str, uf: &str) -> Municipality {
        Municipality {
            country: "Brasil".to_owned(),
            geocode,
            municipio: name.to_owned(),
            microrregiao: String::new(),
            mesorregiao: String::new(),
            mesorregiao_uf: uf.to_owned(),
            mesorregiao_uf_nome: String::new(),
            mesorregiao_uf_regiao_nome: String::new(),
            regiao_imediata: String::new(),
            regiao_intermediaria: String::new(),
            regiao_intermediaria_uf: uf.to_owned(),
            regiao_intermediaria_uf_nome: String::new(),
            regiao_intermediaria_uf_regiao_nome: String::new(),
        }
    }

    fn write_city_artifact(layout: &DataLayout, municipality: &Municipality, weeks: &[i64]) {
        let rows: Vec<Row> = weeks
            .iter()
            .map(|se| {
                let mut row = Row::new();
                row.insert(DISEASE.into(), json!("dengue"));
                row.insert(GEOCODE.into(), json!(municipality.geocode));
                row.insert(SE.into(), json!(se));
                row.insert("casos".into(), json!(1));
                row
            })
            .collect();
        let artifact = enrich_city_frame(Frame::from_records(rows), municipality);
        let path = layout.city_artifact(&municipality.mesorregiao_uf, municipality.geocode);
        ensure_dir(path.parent().unwrap()).unwrap();
        artifact.write_csv(&path).unwrap();
    }

    #[test]
    fn state_rollup_includes_only_available_cities() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), "Brasil", false);
        let municipalities: Vec<Municipality> = (1..=5)
            .map(|i| municipality(3_000_000 + i, &format!("Cidade {i}"), "MG"))
            .collect();

        // Only three of five locations have a city artifact.
        for municipality in municipalities.iter().take(3) {
            write_city_artifact(&layout, municipality, &[202_402, 202_401]);
        }

        let written = merge_state(&layout, "MG", &municipalities).unwrap().unwrap();
        let artifact = Frame::read_csv(&written).unwrap();

        assert_eq!(artifact.len(), 6);
        let geocodes: Vec<i64> = artifact
            .rows()
            .iter()
            .map(|row| as_i64(row.get(GEOCODE).unwrap()).unwrap())
            .collect();
        assert_eq!(
            geocodes,
            vec![3_000_001, 3_000_001, 3_000_002, 3_000_002, 3_000_003, 3_000_003]
        );
        // Weeks descend within each location.
        let weeks: Vec<i64> = artifact
            .rows()
            .iter()
            .map(|row| as_i64(row.get(WEEK).unwrap()).unwrap())
            .collect();
        assert_eq!(weeks, vec![2, 1, 2, 1, 2, 1]);
    }

    #[test]
    fn state_without_artifacts_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), "Brasil", false);
        let municipalities = vec![municipality(3_000_001, "Cidade 1", "MG")];

        let written = merge_state(&layout, "MG", &municipalities).unwrap();

        assert!(written.is_none());
        assert!(!layout.state_artifact("MG").exists());
    }

    #[test]
    fn country_rollup_dedups_states_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), "Brasil", false);

        let mg = municipality(3_000_001, "Cidade MG", "MG");
        let sp = municipality(3_500_001, "Cidade SP", "SP");
        write_city_artifact(&layout, &mg, &[202_401]);
        write_city_artifact(&layout, &sp, &[202_401]);
        merge_state(&layout, "MG", std::slice::from_ref(&mg)).unwrap();
        merge_state(&layout, "SP", std::slice::from_ref(&sp)).unwrap();

        let states = vec![
            "SP".to_owned(),
            "MG".to_owned(),
            "SP".to_owned(),
            "RJ".to_owned(),
        ];
        let written = merge_country(&layout, &states).unwrap().unwrap();
        let artifact = Frame::read_csv(&written).unwrap();

        // One row per state, sorted by state code, duplicates collapsed,
        // RJ (no artifact) skipped.
        assert_eq!(artifact.len(), 2);
        let states: Vec<String> = artifact
            .rows()
            .iter()
            .map(|row| arbo_map_table::cell_to_string(row.get(STATE).unwrap()))
            .collect();
        assert_eq!(states, vec!["MG".to_owned(), "SP".to_owned()]);
    }

    #[test]
    fn country_without_state_artifacts_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), "Brasil", false);

        let written = merge_country(&layout, &["MG".to_owned()]).unwrap();

        assert!(written.is_none());
        assert!(!layout.country_artifact().exists());
    }

    #[test]
    fn unique_states_preserves_first_seen_order() {
        let municipalities = vec![
            municipality(1, "a", "SP"),
            municipality(2, "b", "MG"),
            municipality(3, "c", "SP"),
        ];
        assert_eq!(unique_states(&municipalities), vec!["SP", "MG"]);
    }
}
