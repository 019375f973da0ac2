#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative geography types and the IBGE catalog projection.
//!
//! The geography reference API returns one nested record per district; the
//! catalog keeps a fixed projection of the municipality hierarchy under
//! canonical column names, one row per municipality.

use arbo_map_table::{Row, as_i64, cell_to_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Catalog column holding the unique municipality code.
pub const GEOCODE: &str = "geocode";

/// Catalog column holding the municipality name.
pub const MUNICIPALITY: &str = "municipio";

/// Catalog column holding the two-letter state code.
pub const STATE: &str = "mesorregiao_uf";

/// The fixed projection from nested reference-API fields (dot-flattened)
/// to canonical catalog column names.
pub const IBGE_PROJECTION: &[(&str, &str)] = &[
    ("municipio.id", GEOCODE),
    ("municipio.nome", MUNICIPALITY),
    ("municipio.microrregiao.nome", "microrregiao"),
    ("municipio.microrregiao.mesorregiao.nome", "mesorregiao"),
    ("municipio.microrregiao.mesorregiao.UF.sigla", STATE),
    ("municipio.microrregiao.mesorregiao.UF.nome", "mesorregiao_uf_nome"),
    (
        "municipio.microrregiao.mesorregiao.UF.regiao.nome",
        "mesorregiao_uf_regiao_nome",
    ),
    ("municipio.regiao-imediata.nome", "regiao_imediata"),
    (
        "municipio.regiao-imediata.regiao-intermediaria.nome",
        "regiao_intermediaria",
    ),
    (
        "municipio.regiao-imediata.regiao-intermediaria.UF.sigla",
        "regiao_intermediaria_uf",
    ),
    (
        "municipio.regiao-imediata.regiao-intermediaria.UF.nome",
        "regiao_intermediaria_uf_nome",
    ),
    (
        "municipio.regiao-imediata.regiao-intermediaria.UF.regiao.nome",
        "regiao_intermediaria_uf_regiao_nome",
    ),
];

/// Canonical catalog column order: `country` first, then the projected
/// hierarchy fields.
#[must_use]
pub fn catalog_columns() -> Vec<&'static str> {
    let mut columns = vec!["country"];
    columns.extend(IBGE_PROJECTION.iter().map(|(_, canonical)| *canonical));
    columns
}

/// One municipality and its full containing-region chain.
///
/// Immutable once the catalog is built; every downstream stage reads these
/// attributes from the catalog rather than refetching the reference API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    /// Country the catalog was built for.
    pub country: String,
    /// Unique numeric municipality code.
    pub geocode: i64,
    /// Municipality name.
    pub municipio: String,
    /// Micro-region name.
    pub microrregiao: String,
    /// Meso-region name.
    pub mesorregiao: String,
    /// Two-letter state code (UF).
    pub mesorregiao_uf: String,
    /// State name.
    pub mesorregiao_uf_nome: String,
    /// Macro-region name.
    pub mesorregiao_uf_regiao_nome: String,
    /// Immediate-region name (alternate hierarchy).
    pub regiao_imediata: String,
    /// Intermediate-region name (alternate hierarchy).
    pub regiao_intermediaria: String,
    /// State code of the intermediate region.
    pub regiao_intermediaria_uf: String,
    /// State name of the intermediate region.
    pub regiao_intermediaria_uf_nome: String,
    /// Macro-region name of the intermediate region.
    pub regiao_intermediaria_uf_regiao_nome: String,
}

impl Municipality {
    /// Builds a municipality from one catalog row. Returns `None` when the
    /// row has no usable geocode.
    #[must_use]
    pub fn from_row(row: &Row) -> Option<Self> {
        let text = |column: &str| row.get(column).map_or_else(String::new, cell_to_string);
        Some(Self {
            geocode: row.get(GEOCODE).and_then(as_i64)?,
            country: text("country"),
            municipio: text(MUNICIPALITY),
            microrregiao: text("microrregiao"),
            mesorregiao: text("mesorregiao"),
            mesorregiao_uf: text(STATE),
            mesorregiao_uf_nome: text("mesorregiao_uf_nome"),
            mesorregiao_uf_regiao_nome: text("mesorregiao_uf_regiao_nome"),
            regiao_imediata: text("regiao_imediata"),
            regiao_intermediaria: text("regiao_intermediaria"),
            regiao_intermediaria_uf: text("regiao_intermediaria_uf"),
            regiao_intermediaria_uf_nome: text("regiao_intermediaria_uf_nome"),
            regiao_intermediaria_uf_regiao_nome: text("regiao_intermediaria_uf_regiao_nome"),
        })
    }

    /// The geography attributes a merged artifact carries for this
    /// municipality, in catalog column order (excluding the geocode, which
    /// the surveillance rows already carry).
    #[must_use]
    pub fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("country", Value::String(self.country.clone())),
            (MUNICIPALITY, Value::String(self.municipio.clone())),
            ("microrregiao", Value::String(self.microrregiao.clone())),
            ("mesorregiao", Value::String(self.mesorregiao.clone())),
            (STATE, Value::String(self.mesorregiao_uf.clone())),
            (
                "mesorregiao_uf_nome",
                Value::String(self.mesorregiao_uf_nome.clone()),
            ),
            (
                "mesorregiao_uf_regiao_nome",
                Value::String(self.mesorregiao_uf_regiao_nome.clone()),
            ),
            (
                "regiao_imediata",
                Value::String(self.regiao_imediata.clone()),
            ),
            (
                "regiao_intermediaria",
                Value::String(self.regiao_intermediaria.clone()),
            ),
            (
                "regiao_intermediaria_uf",
                Value::String(self.regiao_intermediaria_uf.clone()),
            ),
            (
                "regiao_intermediaria_uf_nome",
                Value::String(self.regiao_intermediaria_uf_nome.clone()),
            ),
            (
                "regiao_intermediaria_uf_regiao_nome",
                Value::String(self.regiao_intermediaria_uf_regiao_nome.clone()),
            ),
        ]
    }
}
