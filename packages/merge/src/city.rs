//! City-level merge: raw weekly caches → one enriched artifact per
//! location.

use std::fs;
use std::path::PathBuf;

use arbo_map_geography_models::Municipality;
use arbo_map_layout::{CACHE_PREFIX, DataLayout, ensure_dir, has_content};
use arbo_map_surveillance_models::{
    DISEASE, EpiWeek, GEOCODE, IncidenceLevel, Receptivity, SE, Transmission,
};
use arbo_map_table::{Frame, SortKey, as_f64, as_i64};
use serde_json::Value;

use crate::MergeError;

/// Derived column holding the epidemiological year.
pub const YEAR: &str = "ano";

/// Derived column holding the week number within the year.
pub const WEEK: &str = "semana";

/// Upstream bookkeeping columns with no downstream use.
const BOOKKEEPING_COLUMNS: &[&str] = &["id", "versao_modelo", "Localidade_id"];

/// Count-like columns cast to integers after zero-filling.
const INTEGER_COLUMNS: &[&str] = &[
    "casos_est",
    "casos_est_min",
    "casos_est_max",
    "casos",
    "pop",
    "notif_accum_year",
];

/// Measurement columns rounded to two decimals.
const ROUND_2_COLUMNS: &[&str] = &[
    "p_inc100k",
    "tempmin",
    "tempmed",
    "tempmax",
    "umidmin",
    "umidmed",
    "umidmax",
];

/// Model-probability columns rounded to four decimals.
const ROUND_4_COLUMNS: &[&str] = &["p_rt1", "Rt"];

/// Leading columns of a merged artifact: disease, then the geography
/// block.
const FRONT_COLUMNS: &[&str] = &[
    DISEASE,
    "country",
    GEOCODE,
    "municipio",
    "microrregiao",
    "mesorregiao",
    "mesorregiao_uf",
    "mesorregiao_uf_nome",
    "mesorregiao_uf_regiao_nome",
    "regiao_imediata",
    "regiao_intermediaria",
    "regiao_intermediaria_uf",
    "regiao_intermediaria_uf_nome",
    "regiao_intermediaria_uf_regiao_nome",
];

/// Merges every raw weekly cache of one location into its city artifact.
///
/// Returns the artifact path, or `None` (logged) when the location has no
/// raw data — no empty artifact is written.
///
/// # Errors
///
/// Returns [`MergeError`] if a cache cannot be read or the artifact cannot
/// be written.
pub fn merge_city(
    layout: &DataLayout,
    municipality: &Municipality,
) -> Result<Option<PathBuf>, MergeError> {
    let uf = &municipality.mesorregiao_uf;
    log::info!("{} ({uf}) - merging city data...", municipality.municipio);

    let dir = layout.location_dir(uf, municipality.geocode);
    ensure_dir(&dir)?;

    let mut raw_files: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(CACHE_PREFIX))
                && has_content(path)
        })
        .collect();
    raw_files.sort();

    let mut frames = Vec::new();
    for path in &raw_files {
        frames.push(Frame::read_csv(path)?);
    }

    if frames.is_empty() {
        log::info!("{} ({uf}) - no data found!", municipality.municipio);
        return Ok(None);
    }

    let artifact = enrich_city_frame(Frame::concat(frames), municipality);
    let path = layout.city_artifact(uf, municipality.geocode);
    artifact.write_csv(&path)?;
    log::info!(
        "{} ({uf}) - merged {} rows into '{}'",
        municipality.municipio,
        artifact.len(),
        path.display()
    );
    Ok(Some(path))
}

/// Applies the full city-level enrichment to concatenated raw rows:
/// geography attributes, derived level descriptions, week split, integer
/// casts, rounding, bookkeeping drops, column order, and final sort.
#[must_use]
pub fn enrich_city_frame(mut frame: Frame, municipality: &Municipality) -> Frame {
    for (name, value) in municipality.attributes() {
        frame.set_const(name, &value);
    }

    split_week_encoding(&mut frame);
    derive_levels(&mut frame);
    fill_zero_cast_integers(&mut frame);
    round_columns(&mut frame, ROUND_2_COLUMNS, 2);
    round_columns(&mut frame, ROUND_4_COLUMNS, 4);
    frame.drop_columns(BOOKKEEPING_COLUMNS);
    frame.reorder_front(FRONT_COLUMNS);
    frame.sort_by(&[
        SortKey::asc(DISEASE),
        SortKey::desc(YEAR),
        SortKey::desc(WEEK),
    ]);
    frame
}

/// Splits the combined `SE` encoding into `ano` and `semana` columns,
/// placed directly after it.
fn split_week_encoding(frame: &mut Frame) {
    frame.derive_column(SE, WEEK, |cell| {
        cell.and_then(as_i64)
            .map(|se| Value::from(i64::from(EpiWeek::decode(se).week)))
    });
    frame.derive_column(SE, YEAR, |cell| {
        cell.and_then(as_i64)
            .map(|se| Value::from(i64::from(EpiWeek::decode(se).year)))
    });
}

/// Derives the human-readable level columns from their integer codes.
/// Unmapped codes surface as the explicit `Invalid` description.
fn derive_levels(frame: &mut Frame) {
    frame.derive_column("receptivo", "receptivo_desc", |cell| {
        cell.and_then(as_i64)
            .map(|code| Value::String(Receptivity::from_code(code).to_string()))
    });
    frame.derive_column("transmissao", "transmissao_desc", |cell| {
        cell.and_then(as_i64)
            .map(|code| Value::String(Transmission::from_code(code).to_string()))
    });
    frame.derive_column("nivel_inc", "nivel_inc_desc", |cell| {
        cell.and_then(as_i64)
            .map(|code| Value::String(IncidenceLevel::from_code(code).to_string()))
    });
}

/// Zero-fills and truncates the count-like columns to integers.
fn fill_zero_cast_integers(frame: &mut Frame) {
    for column in INTEGER_COLUMNS {
        frame.map_column(column, |cell| {
            Some(Value::from(cell.and_then(as_i64).unwrap_or(0)))
        });
    }
}

/// Rounds measurement columns to `decimals` places. Non-numeric cells are
/// cleared.
fn round_columns(frame: &mut Frame, columns: &[&str], decimals: i32) {
    let factor = 10f64.powi(decimals);
    for column in columns {
        frame.map_column(column, |cell| {
            let value = as_f64(cell?)?;
            serde_json::Number::from_f64((value * factor).round() / factor).map(Value::Number)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbo_map_table::Row;
    use serde_json::json;

    fn municipality() -> Municipality {
        Municipality {
            country: "Brasil".to_owned(),
            geocode: 3_106_200,
            municipio: "Divinópolis".to_owned(),
            microrregiao: "Divinópolis".to_owned(),
            mesorregiao: "Oeste de Minas".to_owned(),
            mesorregiao_uf: "MG".to_owned(),
            mesorregiao_uf_nome: "Minas Gerais".to_owned(),
            mesorregiao_uf_regiao_nome: "Sudeste".to_owned(),
            regiao_imediata: "Divinópolis".to_owned(),
            regiao_intermediaria: "Divinópolis".to_owned(),
            regiao_intermediaria_uf: "MG".to_owned(),
            regiao_intermediaria_uf_nome: "Minas Gerais".to_owned(),
            regiao_intermediaria_uf_regiao_nome: "Sudeste".to_owned(),
        }
    }

    fn raw_row(se: i64, receptivo: i64) -> Row {
        let mut row = Row::new();
        row.insert(DISEASE.into(), json!("dengue"));
        row.insert(GEOCODE.into(), json!(3_106_200));
        row.insert(SE.into(), json!(se));
        row.insert("casos_est".into(), json!(10.4));
        row.insert("casos".into(), Value::Null);
        row.insert("p_rt1".into(), json!(0.123_456));
        row.insert("tempmin".into(), json!(21.567));
        row.insert("receptivo".into(), json!(receptivo));
        row.insert("transmissao".into(), json!(0));
        row.insert("nivel_inc".into(), json!(99));
        row.insert("id".into(), json!(555));
        row.insert("versao_modelo".into(), json!("2024-01-01"));
        row
    }

    #[test]
    fn enrichment_derives_and_cleans_columns() {
        let frame = Frame::from_records(vec![raw_row(202_401, 2), raw_row(202_403, 0)]);
        let enriched = enrich_city_frame(frame, &municipality());

        // Geography block leads, newest week first.
        let front: Vec<&str> = enriched.columns()[..3].iter().map(String::as_str).collect();
        assert_eq!(front, vec![DISEASE, "country", GEOCODE]);
        let first = &enriched.rows()[0];
        assert_eq!(first.get(YEAR), Some(&json!(2024)));
        assert_eq!(first.get(WEEK), Some(&json!(3)));
        assert_eq!(first.get("municipio"), Some(&json!("Divinópolis")));

        // Levels map through the taxonomies, with Invalid fallback.
        assert_eq!(
            first.get("receptivo_desc"),
            Some(&json!("unfavorable"))
        );
        assert_eq!(
            enriched.rows()[1].get("receptivo_desc"),
            Some(&json!("favorable this and last week"))
        );
        assert_eq!(first.get("transmissao_desc"), Some(&json!("no evidence")));
        assert_eq!(first.get("nivel_inc_desc"), Some(&json!("Invalid")));

        // Casts, rounding, and bookkeeping drops.
        assert_eq!(first.get("casos_est"), Some(&json!(10)));
        assert_eq!(first.get("casos"), Some(&json!(0)));
        assert_eq!(first.get("p_rt1"), Some(&json!(0.1235)));
        assert_eq!(first.get("tempmin"), Some(&json!(21.57)));
        assert!(!enriched.has_column("id"));
        assert!(!enriched.has_column("versao_modelo"));
    }

    #[test]
    fn merge_skips_location_without_raw_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), "Brasil", false);

        let written = merge_city(&layout, &municipality()).unwrap();

        assert!(written.is_none());
        assert!(!layout.city_artifact("MG", 3_106_200).exists());
    }

    #[test]
    fn merge_reads_only_raw_cache_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), "Brasil", false);
        let municipality = municipality();
        let location_dir = layout.location_dir("MG", municipality.geocode);
        ensure_dir(&location_dir).unwrap();

        Frame::from_records(vec![raw_row(202_401, 1)])
            .write_csv(&layout.cache_file("MG", municipality.geocode, 2024))
            .unwrap();
        // A previous artifact must not be re-merged into the new one.
        Frame::from_records(vec![raw_row(202_402, 1), raw_row(202_403, 1)])
            .write_csv(&layout.city_artifact("MG", municipality.geocode))
            .unwrap();

        let written = merge_city(&layout, &municipality).unwrap().unwrap();
        let artifact = Frame::read_csv(&written).unwrap();

        assert_eq!(artifact.len(), 1);
        assert_eq!(artifact.rows()[0].get(WEEK), Some(&json!(1)));
    }
}
