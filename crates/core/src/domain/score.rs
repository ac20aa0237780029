use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::clinic::ClinicId;

/// Confidence-weighted aspect means for one clinic, in [-1, +1].
///
/// A `None` mean records that no contributing review scored that aspect;
/// the score calculator substitutes the neutral midpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AspectAggregate {
    pub clinic_id: ClinicId,
    pub mean_price: Option<f64>,
    pub mean_skill: Option<f64>,
    pub mean_kindness: Option<f64>,
    pub mean_waiting_time: Option<f64>,
    pub mean_facility: Option<f64>,
    pub mean_overtreatment: Option<f64>,
    pub reviews_analyzed: u32,
    pub algorithm_version: String,
    pub last_calculated: DateTime<Utc>,
}

/// Derived per-clinic competitiveness scores, all in [0, 100] and stored
/// rounded to two decimal places. `overtreatment_risk` is polarity-inverted:
/// a higher value means a worse clinic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicScore {
    pub clinic_id: ClinicId,
    pub price_competitiveness: f64,
    pub medical_skill: f64,
    pub overtreatment_risk: f64,
    pub patient_satisfaction: f64,
    pub composite_score: f64,
    pub algorithm_version: String,
    pub last_calculated: DateTime<Utc>,
    pub reviews_analyzed: u32,
    pub price_data_points: u32,
}

impl ClinicScore {
    /// Whether the stored row is still usable for the given version and
    /// freshness window.
    pub fn is_fresh(&self, algorithm_version: &str, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.algorithm_version == algorithm_version && now - self.last_calculated <= max_age
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn score(last_calculated: DateTime<Utc>, version: &str) -> ClinicScore {
        ClinicScore {
            clinic_id: ClinicId(7),
            price_competitiveness: 70.0,
            medical_skill: 80.0,
            overtreatment_risk: 20.0,
            patient_satisfaction: 75.0,
            composite_score: 76.0,
            algorithm_version: version.to_owned(),
            last_calculated,
            reviews_analyzed: 12,
            price_data_points: 3,
        }
    }

    #[test]
    fn freshness_respects_window_and_version() {
        let now = Utc::now();
        let fresh = score(now - Duration::hours(2), "v1.0");
        assert!(fresh.is_fresh("v1.0", Duration::hours(24), now));
        assert!(!fresh.is_fresh("v1.1", Duration::hours(24), now));

        let stale = score(now - Duration::hours(25), "v1.0");
        assert!(!stale.is_fresh("v1.0", Duration::hours(24), now));
    }
}
