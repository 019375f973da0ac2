#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Disease taxonomy and epidemiological week types.
//!
//! Defines the arboviruses tracked by the surveillance source, the
//! `year*100 + week` epidemiological week encoding ("SE"), and the
//! alert-level classifications the source reports as small integer codes.
//! Every classification has an explicit [`Invalid`](Receptivity::Invalid)
//! variant so unmapped upstream codes survive into output for inspection
//! instead of failing the pipeline.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Cache column holding the combined `year*100 + week` week encoding.
pub const SE: &str = "SE";

/// Cache column tagging each row with its disease.
pub const DISEASE: &str = "disease";

/// Cache column tagging each row with its municipality code.
pub const GEOCODE: &str = "geocode";

/// An arbovirus tracked by the surveillance source.
///
/// The lowercase form is the literal `disease` query value of the alert
/// API.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Disease {
    /// Dengue fever.
    Dengue,
    /// Chikungunya.
    Chikungunya,
    /// Zika virus disease.
    Zika,
}

impl Disease {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Dengue, Self::Chikungunya, Self::Zika]
    }
}

/// An epidemiological week: a `(year, week)` pair encoded upstream as
/// `year*100 + week` (e.g. `202403` for week 3 of 2024).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpiWeek {
    /// Calendar year of the week.
    pub year: i32,
    /// Week number within the year (1-53).
    pub week: u32,
}

impl EpiWeek {
    /// Creates an epidemiological week.
    #[must_use]
    pub const fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// Encodes this week as `year*100 + week`.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn encode(self) -> i64 {
        self.year as i64 * 100 + self.week as i64
    }

    /// Decodes a combined `year*100 + week` value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn decode(se: i64) -> Self {
        Self {
            year: (se / 100) as i32,
            week: (se % 100) as u32,
        }
    }
}

impl std::fmt::Display for EpiWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Receptivity of a location to arbovirus transmission, as reported by the
/// alert source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
pub enum Receptivity {
    /// Code 0: climate unfavorable to transmission.
    #[strum(serialize = "unfavorable")]
    Unfavorable,
    /// Code 1: climate favorable to transmission.
    #[strum(serialize = "favorable")]
    Favorable,
    /// Code 2: favorable this week and the previous one.
    #[strum(serialize = "favorable this and last week")]
    FavorableTwoWeeks,
    /// Code 3: favorable for at least three consecutive weeks.
    #[strum(serialize = "favorable for at least three weeks")]
    FavorableSustained,
    /// Any unmapped code.
    #[strum(serialize = "Invalid")]
    Invalid,
}

impl Receptivity {
    /// Maps an upstream integer code to its classification.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Unfavorable,
            1 => Self::Favorable,
            2 => Self::FavorableTwoWeeks,
            3 => Self::FavorableSustained,
            _ => Self::Invalid,
        }
    }
}

/// Evidence level of sustained transmission, as reported by the alert
/// source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
pub enum Transmission {
    /// Code 0: no evidence of sustained transmission.
    #[strum(serialize = "no evidence")]
    NoEvidence,
    /// Code 1: possible sustained transmission.
    #[strum(serialize = "possible")]
    Possible,
    /// Code 2: probable sustained transmission.
    #[strum(serialize = "probable")]
    Probable,
    /// Code 3: highly probable sustained transmission.
    #[strum(serialize = "highly probable")]
    HighlyProbable,
    /// Any unmapped code.
    #[strum(serialize = "Invalid")]
    Invalid,
}

impl Transmission {
    /// Maps an upstream integer code to its classification.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::NoEvidence,
            1 => Self::Possible,
            2 => Self::Probable,
            3 => Self::HighlyProbable,
            _ => Self::Invalid,
        }
    }
}

/// Incidence relative to the location's epidemic thresholds, as reported by
/// the alert source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
pub enum IncidenceLevel {
    /// Code 0: incidence below the pre-epidemic threshold.
    #[strum(serialize = "below pre-epidemic threshold")]
    BelowPreEpidemic,
    /// Code 1: incidence above the pre-epidemic threshold but below the
    /// epidemic threshold.
    #[strum(serialize = "above pre-epidemic but below epidemic threshold")]
    AbovePreEpidemic,
    /// Code 2: incidence above the epidemic threshold.
    #[strum(serialize = "above epidemic threshold")]
    AboveEpidemic,
    /// Any unmapped code.
    #[strum(serialize = "Invalid")]
    Invalid,
}

impl IncidenceLevel {
    /// Maps an upstream integer code to its classification.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::BelowPreEpidemic,
            1 => Self::AbovePreEpidemic,
            2 => Self::AboveEpidemic,
            _ => Self::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    #[test]
    fn epi_week_round_trips() {
        for year in [2020, 2024, 2025] {
            for week in 1..=53u32 {
                let encoded = EpiWeek::new(year, week).encode();
                let decoded = EpiWeek::decode(encoded);
                assert_eq!(decoded.year, year);
                assert_eq!(decoded.week, week);
                assert_eq!(decoded.encode(), encoded);
            }
        }
    }

    #[test]
    fn epi_week_decodes_combined_encoding() {
        let week = EpiWeek::decode(202_403);
        assert_eq!(week.year, 2024);
        assert_eq!(week.week, 3);
    }

    #[test]
    fn disease_query_values_are_lowercase() {
        assert_eq!(Disease::Dengue.to_string(), "dengue");
        assert_eq!(Disease::Chikungunya.to_string(), "chikungunya");
        assert_eq!(Disease::Zika.to_string(), "zika");
        assert_eq!(Disease::from_str("dengue"), Ok(Disease::Dengue));
        assert!(Disease::from_str("malaria").is_err());
    }

    #[test]
    fn receptivity_codes_map_completely() {
        let descriptions: Vec<String> = [0, 1, 2, 3, 99]
            .iter()
            .map(|code| Receptivity::from_code(*code).to_string())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "unfavorable",
                "favorable",
                "favorable this and last week",
                "favorable for at least three weeks",
                "Invalid",
            ]
        );
    }

    #[test]
    fn transmission_codes_map_completely() {
        assert_eq!(Transmission::from_code(0).to_string(), "no evidence");
        assert_eq!(Transmission::from_code(1).to_string(), "possible");
        assert_eq!(Transmission::from_code(2).to_string(), "probable");
        assert_eq!(Transmission::from_code(3).to_string(), "highly probable");
        assert_eq!(Transmission::from_code(-1).to_string(), "Invalid");
    }

    #[test]
    fn incidence_codes_map_completely() {
        assert_eq!(
            IncidenceLevel::from_code(0).to_string(),
            "below pre-epidemic threshold"
        );
        assert_eq!(
            IncidenceLevel::from_code(1).to_string(),
            "above pre-epidemic but below epidemic threshold"
        );
        assert_eq!(
            IncidenceLevel::from_code(2).to_string(),
            "above epidemic threshold"
        );
        assert_eq!(IncidenceLevel::from_code(7).to_string(), "Invalid");
    }
}
