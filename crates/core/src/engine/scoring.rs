//! Score calculator: turns aspect aggregates and price comparisons into the
//! four competitiveness sub-scores and the weighted composite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::clinic::ClinicId;
use crate::domain::score::{AspectAggregate, ClinicScore};

/// Neutral midpoint used whenever a sentiment dimension is missing.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Clinic mean at or below 0.9x the regional mean earns the cheap bonus.
const CHEAP_PRICE_RATIO: f64 = 0.9;
const CHEAP_PRICE_BONUS: f64 = 20.0;

/// Clinic mean at or above 1.3x the regional mean takes the penalty.
const EXPENSIVE_PRICE_RATIO: f64 = 1.3;
const EXPENSIVE_PRICE_PENALTY: f64 = 30.0;

/// Weights for the composite score. Fixed by product contract; the
/// algorithm version string records the combination.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub price_competitiveness: f64,
    pub medical_skill: f64,
    pub overtreatment_risk: f64,
    pub patient_satisfaction: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price_competitiveness: 0.30,
            medical_skill: 0.25,
            overtreatment_risk: 0.25,
            patient_satisfaction: 0.20,
        }
    }
}

/// Treatment-qualified mean prices feeding the price adjustment. Either side
/// missing means no adjustment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PriceComparison {
    pub clinic_mean: Option<f64>,
    pub regional_mean: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubScores {
    pub price_competitiveness: f64,
    pub medical_skill: f64,
    pub overtreatment_risk: f64,
    pub patient_satisfaction: f64,
}

#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    weights: ScoreWeights,
    algorithm_version: String,
}

impl ScoreCalculator {
    pub fn new(weights: ScoreWeights, algorithm_version: impl Into<String>) -> Self {
        Self { weights, algorithm_version: algorithm_version.into() }
    }

    pub fn algorithm_version(&self) -> &str {
        &self.algorithm_version
    }

    /// Map a sentiment in [-1, +1] onto [0, 100]; missing sentiment is
    /// neutral.
    pub fn normalize_sentiment(score: Option<f64>) -> f64 {
        match score {
            Some(value) => ((value + 1.0) * 50.0).clamp(0.0, 100.0),
            None => NEUTRAL_SCORE,
        }
    }

    /// Polarity-inverted overtreatment figure: +1 (no perceived
    /// overtreatment) maps to 0 risk, -1 maps to 100.
    pub fn overtreatment_risk(sentiment: Option<f64>) -> f64 {
        match sentiment {
            Some(value) => ((1.0 - value) * 50.0).clamp(0.0, 100.0),
            None => NEUTRAL_SCORE,
        }
    }

    /// Mean of the normalized kindness/waiting-time/facility sentiments over
    /// the non-null terms; neutral when all three are missing.
    pub fn patient_satisfaction(
        kindness: Option<f64>,
        waiting_time: Option<f64>,
        facility: Option<f64>,
    ) -> f64 {
        let terms: Vec<f64> = [kindness, waiting_time, facility]
            .into_iter()
            .flatten()
            .map(|value| Self::normalize_sentiment(Some(value)))
            .collect();

        if terms.is_empty() {
            return NEUTRAL_SCORE;
        }
        terms.iter().sum::<f64>() / terms.len() as f64
    }

    /// Normalized price sentiment plus the regional adjustment when both
    /// treatment-qualified means exist.
    pub fn price_competitiveness(sentiment: Option<f64>, comparison: PriceComparison) -> f64 {
        let base = Self::normalize_sentiment(sentiment);

        let (Some(clinic_mean), Some(regional_mean)) =
            (comparison.clinic_mean, comparison.regional_mean)
        else {
            return base;
        };
        if regional_mean <= 0.0 {
            return base;
        }

        let ratio = clinic_mean / regional_mean;
        if ratio <= CHEAP_PRICE_RATIO {
            (base + CHEAP_PRICE_BONUS).min(100.0)
        } else if ratio >= EXPENSIVE_PRICE_RATIO {
            (base - EXPENSIVE_PRICE_PENALTY).max(0.0)
        } else {
            base
        }
    }

    /// Weighted composite, monotone-good: the overtreatment term enters as
    /// (100 - risk).
    pub fn composite(&self, sub: &SubScores) -> f64 {
        sub.price_competitiveness * self.weights.price_competitiveness
            + sub.medical_skill * self.weights.medical_skill
            + (100.0 - sub.overtreatment_risk) * self.weights.overtreatment_risk
            + sub.patient_satisfaction * self.weights.patient_satisfaction
    }

    pub fn sub_scores(&self, aggregate: &AspectAggregate, comparison: PriceComparison) -> SubScores {
        SubScores {
            price_competitiveness: Self::price_competitiveness(aggregate.mean_price, comparison),
            medical_skill: Self::normalize_sentiment(aggregate.mean_skill),
            overtreatment_risk: Self::overtreatment_risk(aggregate.mean_overtreatment),
            patient_satisfaction: Self::patient_satisfaction(
                aggregate.mean_kindness,
                aggregate.mean_waiting_time,
                aggregate.mean_facility,
            ),
        }
    }

    /// Full clinic score from an aggregate, rounded to two decimals the way
    /// rows are persisted.
    pub fn build_score(
        &self,
        clinic_id: ClinicId,
        aggregate: &AspectAggregate,
        comparison: PriceComparison,
        price_data_points: u32,
        now: DateTime<Utc>,
    ) -> ClinicScore {
        let sub = self.sub_scores(aggregate, comparison);
        ClinicScore {
            clinic_id,
            price_competitiveness: round2(sub.price_competitiveness),
            medical_skill: round2(sub.medical_skill),
            overtreatment_risk: round2(sub.overtreatment_risk),
            patient_satisfaction: round2(sub.patient_satisfaction),
            composite_score: round2(self.composite(&sub)),
            algorithm_version: self.algorithm_version.clone(),
            last_calculated: now,
            reviews_analyzed: aggregate.reviews_analyzed,
            price_data_points,
        }
    }
}

/// Round to two decimal places, the stored representation of every score.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
