use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::clinic::ClinicId;

/// Treatment categories carried on price observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentType {
    Scaling,
    Implant,
    RootCanal,
    Orthodontics,
    Whitening,
    Extraction,
    Filling,
    Crown,
    Bridge,
    Denture,
    Other,
}

impl TreatmentType {
    pub const ALL: [TreatmentType; 11] = [
        Self::Scaling,
        Self::Implant,
        Self::RootCanal,
        Self::Orthodontics,
        Self::Whitening,
        Self::Extraction,
        Self::Filling,
        Self::Crown,
        Self::Bridge,
        Self::Denture,
        Self::Other,
    ];

    /// snake_case identifier used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scaling => "scaling",
            Self::Implant => "implant",
            Self::RootCanal => "root_canal",
            Self::Orthodontics => "orthodontics",
            Self::Whitening => "whitening",
            Self::Extraction => "extraction",
            Self::Filling => "filling",
            Self::Crown => "crown",
            Self::Bridge => "bridge",
            Self::Denture => "denture",
            Self::Other => "other",
        }
    }

    /// Korean display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scaling => "스케일링",
            Self::Implant => "임플란트",
            Self::RootCanal => "신경치료",
            Self::Orthodontics => "교정",
            Self::Whitening => "미백",
            Self::Extraction => "발치",
            Self::Filling => "충치치료",
            Self::Crown => "크라운",
            Self::Bridge => "브릿지",
            Self::Denture => "틀니",
            Self::Other => "기타",
        }
    }
}

impl std::fmt::Display for TreatmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TreatmentType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scaling" => Ok(Self::Scaling),
            "implant" => Ok(Self::Implant),
            "root_canal" => Ok(Self::RootCanal),
            "orthodontics" => Ok(Self::Orthodontics),
            "whitening" => Ok(Self::Whitening),
            "extraction" => Ok(Self::Extraction),
            "filling" => Ok(Self::Filling),
            "crown" => Ok(Self::Crown),
            "bridge" => Ok(Self::Bridge),
            "denture" => Ok(Self::Denture),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown treatment type `{other}`")),
        }
    }
}

/// A single extracted treatment price in KRW (no subunit).
///
/// Outlier marking is done by an external batch job; the engine only
/// respects the flag. Unverified or outlier observations never enter the
/// regional price index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub clinic_id: ClinicId,
    pub treatment_type: TreatmentType,
    pub amount: i64,
    pub extraction_confidence: f64,
    pub is_verified: bool,
    pub is_outlier: bool,
}

impl PriceObservation {
    pub fn is_indexable(&self) -> bool {
        self.is_verified && !self.is_outlier
    }
}

/// Per-(district, treatment) price statistics. A row is usable only when
/// `sample_count >= 5`; thinner samples surface as insufficient data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionalPriceStats {
    pub district: String,
    pub treatment_type: TreatmentType,
    pub min_price: i64,
    pub q1_price: f64,
    pub median_price: f64,
    pub q3_price: f64,
    pub max_price: i64,
    pub mean_price: f64,
    pub std_dev: f64,
    pub sample_count: u32,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn treatment_type_round_trips_through_str() {
        for treatment in TreatmentType::ALL {
            let parsed: TreatmentType = treatment.as_str().parse().expect("parse");
            assert_eq!(parsed, treatment);
        }
    }

    #[test]
    fn treatment_type_rejects_unknown_values() {
        assert!("veneers".parse::<TreatmentType>().is_err());
    }

    #[test]
    fn only_verified_non_outlier_observations_are_indexable() {
        let base = PriceObservation {
            clinic_id: ClinicId(1),
            treatment_type: TreatmentType::Scaling,
            amount: 50_000,
            extraction_confidence: 0.9,
            is_verified: true,
            is_outlier: false,
        };
        assert!(base.is_indexable());
        assert!(!PriceObservation { is_verified: false, ..base.clone() }.is_indexable());
        assert!(!PriceObservation { is_outlier: true, ..base }.is_indexable());
    }
}
