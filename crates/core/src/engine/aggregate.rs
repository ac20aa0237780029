//! Aspect aggregator: confidence-weighted means over a clinic's sentiment
//! vectors. A pure function of the review set; the engine persists the
//! result as an `AspectAggregate` row for hot paths.

use chrono::{DateTime, Utc};

use crate::domain::clinic::ClinicId;
use crate::domain::score::AspectAggregate;
use crate::domain::sentiment::SentimentRecord;

/// Confidence-weighted mean over one aspect dimension. `None` when no
/// record scored the aspect or all confidences are zero.
fn weighted_mean(records: &[SentimentRecord], pick: impl Fn(&SentimentRecord) -> Option<f64>) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for record in records {
        if let Some(score) = pick(record) {
            weighted_sum += score * record.confidence;
            total_weight += record.confidence;
        }
    }

    (total_weight > 0.0).then(|| weighted_sum / total_weight)
}

/// Aggregate a clinic's sentiment vectors into per-aspect means.
///
/// Returns `None` ("not enough reviews") when fewer than `min_reviews`
/// records contribute; that clinic is then skipped by the score calculator
/// rather than treated as an error.
pub fn aggregate_sentiments(
    clinic_id: ClinicId,
    records: &[SentimentRecord],
    min_reviews: u32,
    algorithm_version: &str,
    now: DateTime<Utc>,
) -> Option<AspectAggregate> {
    if (records.len() as u32) < min_reviews {
        return None;
    }

    Some(AspectAggregate {
        clinic_id,
        mean_price: weighted_mean(records, |r| r.price),
        mean_skill: weighted_mean(records, |r| r.skill),
        mean_kindness: weighted_mean(records, |r| r.kindness),
        mean_waiting_time: weighted_mean(records, |r| r.waiting_time),
        mean_facility: weighted_mean(records, |r| r.facility),
        mean_overtreatment: weighted_mean(records, |r| r.overtreatment),
        reviews_analyzed: records.len() as u32,
        algorithm_version: algorithm_version.to_owned(),
        last_calculated: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(review_id: i64, skill: f64, confidence: f64) -> SentimentRecord {
        SentimentRecord {
            review_id,
            price: Some(0.2),
            skill: Some(skill),
            kindness: Some(0.1),
            waiting_time: None,
            facility: Some(-0.3),
            overtreatment: Some(0.5),
            confidence,
            model_version: "kobert-v2".to_owned(),
        }
    }

    #[test]
    fn below_min_reviews_yields_none() {
        let records: Vec<_> = (0..9).map(|i| record(i, 0.5, 0.9)).collect();
        assert!(aggregate_sentiments(ClinicId(1), &records, 10, "v1.0", Utc::now()).is_none());
    }

    #[test]
    fn exactly_min_reviews_is_included() {
        let records: Vec<_> = (0..10).map(|i| record(i, 0.5, 0.9)).collect();
        let aggregate =
            aggregate_sentiments(ClinicId(1), &records, 10, "v1.0", Utc::now()).expect("aggregate");
        assert_eq!(aggregate.reviews_analyzed, 10);
    }

    #[test]
    fn higher_confidence_reviews_weigh_more() {
        let records = vec![record(1, 1.0, 0.9), record(2, -1.0, 0.1)];
        let aggregate =
            aggregate_sentiments(ClinicId(1), &records, 1, "v1.0", Utc::now()).expect("aggregate");
        // (1.0*0.9 + -1.0*0.1) / 1.0 = 0.8
        let mean_skill = aggregate.mean_skill.expect("skill mean");
        assert!((mean_skill - 0.8).abs() < 1e-9);
    }

    #[test]
    fn aspect_with_no_scores_stays_none() {
        let records = vec![record(1, 0.4, 0.8), record(2, 0.6, 0.7)];
        let aggregate =
            aggregate_sentiments(ClinicId(1), &records, 1, "v1.0", Utc::now()).expect("aggregate");
        assert_eq!(aggregate.mean_waiting_time, None);
        assert!(aggregate.mean_price.is_some());
    }

    #[test]
    fn means_stay_in_contract_range() {
        let records: Vec<_> = (0..12).map(|i| record(i, if i % 2 == 0 { 1.0 } else { -1.0 }, 1.0)).collect();
        let aggregate =
            aggregate_sentiments(ClinicId(1), &records, 10, "v1.0", Utc::now()).expect("aggregate");
        for mean in [
            aggregate.mean_price,
            aggregate.mean_skill,
            aggregate.mean_kindness,
            aggregate.mean_facility,
            aggregate.mean_overtreatment,
        ]
        .into_iter()
        .flatten()
        {
            assert!((-1.0..=1.0).contains(&mean));
        }
    }

    #[test]
    fn zero_confidence_records_do_not_produce_a_mean() {
        let records = vec![record(1, 0.5, 0.0), record(2, 0.7, 0.0)];
        let aggregate =
            aggregate_sentiments(ClinicId(1), &records, 1, "v1.0", Utc::now()).expect("aggregate");
        assert_eq!(aggregate.mean_skill, None);
    }
}
