//! Recommendation engine: wires the filter stage, score calculator, price
//! index, ranking cache, and explanation generator behind one operation.

pub mod aggregate;
pub mod cache;
pub mod explain;
pub mod filter;
pub mod price_index;
pub mod scoring;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::domain::clinic::ClinicId;
use crate::domain::price::{RegionalPriceStats, TreatmentType};
use crate::domain::recommendation::{
    RankedClinic, RecommendationFeedback, RecommendationLogEntry, RecommendationMetadata,
    RecommendationRequest, RecommendationResponse, RequestContext, RequestOutcome,
};
use crate::domain::score::ClinicScore;
use crate::domain::sentiment::SentimentRecord;
use crate::errors::RecommendError;
use crate::store::{
    ClinicDirectory, FeedbackStore, PriceStore, RecommendationLogStore, ScoreStore,
    SentimentStore, StoreError,
};

use cache::{CacheKey, RankingCache};
use filter::{Candidate, FilterStage};
use price_index::RegionalPriceIndex;
use scoring::{PriceComparison, ScoreCalculator};

/// Soft latency ceiling; exceeding it logs a warning but still returns.
const SLOW_REQUEST_MS: u64 = 3000;

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

/// The store seams the engine is constructed over. The composition root
/// (server bootstrap) holds the one instance; there are no module-level
/// singletons.
#[derive(Clone)]
pub struct EngineStores {
    pub clinics: Arc<dyn ClinicDirectory>,
    pub sentiments: Arc<dyn SentimentStore>,
    pub prices: Arc<dyn PriceStore>,
    pub scores: Arc<dyn ScoreStore>,
    pub log: Arc<dyn RecommendationLogStore>,
    pub feedback: Arc<dyn FeedbackStore>,
}

pub struct RecommendationEngine {
    config: EngineConfig,
    stores: EngineStores,
    calculator: ScoreCalculator,
    filter: FilterStage,
    price_index: RegionalPriceIndex,
    cache: RankingCache,
    // Per-clinic recompute locks; concurrent recomputations of the same
    // clinic collapse to one.
    clinic_locks: AsyncMutex<HashMap<ClinicId, Arc<AsyncMutex<()>>>>,
}

#[derive(Clone, Debug)]
struct ValidatedRequest {
    district: String,
    treatment: Option<TreatmentType>,
    user_location: Option<(f64, f64)>,
    limit: u32,
}

struct ScoredCandidate {
    candidate: Candidate,
    score: ClinicScore,
}

impl RecommendationEngine {
    pub fn new(config: EngineConfig, stores: EngineStores) -> Self {
        let calculator = ScoreCalculator::new(config.weights, config.algorithm_version.clone());
        let filter = FilterStage {
            min_reviews: config.min_reviews,
            search_radius_km: config.search_radius_km,
        };
        let price_index = RegionalPriceIndex::new(Arc::clone(&stores.prices));
        let cache = RankingCache::new(Duration::from_secs(config.cache_ttl_secs));
        Self {
            config,
            stores,
            calculator,
            filter,
            price_index,
            cache,
            clinic_locks: AsyncMutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The public recommendation operation. Every outcome, including
    /// failures, is appended to the recommendation log with its elapsed
    /// time and resulting clinic ids.
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
        context: RequestContext,
    ) -> Result<RecommendationResponse, RecommendError> {
        let started = Instant::now();
        let validated = validate(&request)?;

        let result = self.ranked_list(&validated, started).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(recommendations) => {
                if elapsed_ms > SLOW_REQUEST_MS {
                    warn!(
                        district = %validated.district,
                        elapsed_ms,
                        "recommendation exceeded latency target"
                    );
                }
                self.append_log(&validated, &context, &recommendations, elapsed_ms, RequestOutcome::Ok, None)
                    .await;
                info!(
                    district = %validated.district,
                    treatment = validated.treatment.map(|t| t.as_str()),
                    count = recommendations.len(),
                    elapsed_ms,
                    "recommendation served"
                );
                let note = recommendations
                    .is_empty()
                    .then(|| "조건에 맞는 치과를 찾지 못했습니다".to_owned());
                Ok(RecommendationResponse {
                    metadata: RecommendationMetadata {
                        district: validated.district,
                        treatment_type: validated.treatment,
                        total_count: recommendations.len() as u32,
                        response_time_ms: elapsed_ms,
                        algorithm_version: self.config.algorithm_version.clone(),
                        note,
                    },
                    recommendations,
                })
            }
            Err(error) => {
                let outcome = match error {
                    RecommendError::Timeout { .. } => RequestOutcome::Timeout,
                    _ => RequestOutcome::Error,
                };
                self.append_log(&validated, &context, &[], elapsed_ms, outcome, Some(error.code()))
                    .await;
                Err(error)
            }
        }
    }

    /// Read-only price comparison surface: stats or insufficient data.
    pub async fn regional_price_stats(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Option<RegionalPriceStats>, RecommendError> {
        let district = district.trim();
        if district.is_empty() {
            return Err(RecommendError::invalid("district", "must not be empty"));
        }
        Ok(self.price_index.get(district, treatment).await?)
    }

    /// Feedback upsert keyed by (log_id, clinic_id).
    pub async fn submit_feedback(
        &self,
        feedback: RecommendationFeedback,
    ) -> Result<(), RecommendError> {
        feedback.validate()?;
        self.stores.feedback.upsert(&feedback).await?;
        Ok(())
    }

    async fn ranked_list(
        &self,
        validated: &ValidatedRequest,
        started: Instant,
    ) -> Result<Vec<RankedClinic>, RecommendError> {
        let key = CacheKey::new(
            &validated.district,
            validated.treatment,
            validated.limit,
            &self.config.fingerprint(),
        );

        if let Some(hit) = self.cache.get(&key) {
            return Ok((*hit).clone());
        }

        // Single-flight: one computation per key, late arrivals re-check.
        let flight = self.cache.flight(&key).await;
        let result = {
            let _guard = flight.lock().await;
            match self.cache.get(&key) {
                Some(hit) => Ok((*hit).clone()),
                None => {
                    let deadline = Duration::from_millis(self.config.request_deadline_ms);
                    let computed =
                        tokio::time::timeout(deadline, self.compute_rankings(validated))
                            .await
                            .map_err(|_| RecommendError::Timeout {
                                elapsed_ms: started.elapsed().as_millis() as u64,
                            })
                            .and_then(|inner| inner);
                    if let Ok(ranked) = &computed {
                        self.cache.put(key.clone(), ranked.clone());
                    }
                    computed
                }
            }
        };
        drop(flight);
        self.cache.finish_flight(&key).await;
        result
    }

    async fn compute_rankings(
        &self,
        validated: &ValidatedRequest,
    ) -> Result<Vec<RankedClinic>, RecommendError> {
        let clinics = self.stores.clinics.clinics_in_district(&validated.district).await?;
        let clinic_ids: Vec<ClinicId> = clinics.iter().map(|clinic| clinic.id).collect();
        let review_counts = self.stores.clinics.review_counts(&clinic_ids).await?;

        let clinics_with_price = match validated.treatment {
            Some(treatment) => {
                self.stores.prices.clinics_with_price_data(&clinic_ids, treatment).await?
            }
            None => HashSet::new(),
        };

        let candidates = self.filter.apply(
            clinics,
            &validated.district,
            validated.user_location,
            &review_counts,
            validated.treatment.is_some(),
            &clinics_with_price,
        );

        let candidate_count = candidates.len();
        let mut scored: Vec<ScoredCandidate> = Vec::with_capacity(candidate_count);
        let mut failures = 0usize;

        for candidate in candidates {
            match self.score_clinic(&candidate, validated.treatment).await {
                Ok(Some(score)) => scored.push(ScoredCandidate { candidate, score }),
                Ok(None) => {} // not enough reviews; silently excluded
                Err(StoreError::Unavailable(message)) => {
                    return Err(RecommendError::BackendUnavailable(message));
                }
                Err(error) => {
                    // Malformed per-clinic data is absorbed; the clinic is
                    // dropped and ranking continues.
                    failures += 1;
                    warn!(
                        clinic_id = %candidate.clinic.id,
                        error = %error,
                        "clinic scoring failed, dropping from ranking"
                    );
                }
            }
        }

        if scored.is_empty() && failures > 0 && failures == candidate_count {
            return Err(RecommendError::Internal(format!(
                "scoring failed for all {candidate_count} candidate clinics"
            )));
        }

        scored.sort_by(|a, b| {
            b.score
                .composite_score
                .partial_cmp(&a.score.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.candidate.has_treatment_price.cmp(&a.candidate.has_treatment_price)
                })
                .then_with(|| compare_distance(a.candidate.distance_km, b.candidate.distance_km))
                .then_with(|| b.candidate.review_count.cmp(&a.candidate.review_count))
                .then_with(|| a.candidate.clinic.id.cmp(&b.candidate.clinic.id))
        });
        scored.truncate(validated.limit as usize);

        Ok(scored
            .into_iter()
            .map(|entry| {
                let mut ranked = RankedClinic {
                    clinic_id: entry.candidate.clinic.id,
                    clinic_name: entry.candidate.clinic.name,
                    clinic_address: entry.candidate.clinic.address,
                    clinic_phone: entry.candidate.clinic.phone,
                    district: entry.candidate.clinic.district,
                    composite_score: entry.score.composite_score,
                    price_competitiveness: entry.score.price_competitiveness,
                    medical_skill: entry.score.medical_skill,
                    overtreatment_risk: entry.score.overtreatment_risk,
                    patient_satisfaction: entry.score.patient_satisfaction,
                    review_count: entry.candidate.review_count,
                    distance_km: entry.candidate.distance_km,
                    has_parking: entry.candidate.clinic.has_parking,
                    night_service: entry.candidate.clinic.night_service,
                    weekend_service: entry.candidate.clinic.weekend_service,
                    explanation: String::new(),
                };
                ranked.explanation = explain::explain(&ranked);
                ranked
            })
            .collect())
    }

    /// Fetch or recompute one clinic's score. `Ok(None)` means the clinic
    /// has too few reviews and is excluded from ranking.
    async fn score_clinic(
        &self,
        candidate: &Candidate,
        treatment: Option<TreatmentType>,
    ) -> Result<Option<ClinicScore>, StoreError> {
        let clinic_id = candidate.clinic.id;
        let lock = self.clinic_lock(clinic_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.fetch_or_recompute_score(candidate, treatment).await
        };
        drop(lock);
        self.release_clinic_lock(clinic_id).await;
        result
    }

    async fn fetch_or_recompute_score(
        &self,
        candidate: &Candidate,
        treatment: Option<TreatmentType>,
    ) -> Result<Option<ClinicScore>, StoreError> {
        let clinic_id = candidate.clinic.id;
        let now = Utc::now();
        let max_age = chrono::Duration::hours(self.config.freshness_window_hours);
        if let Some(stored) = self.stores.scores.find_score(clinic_id).await? {
            if stored.is_fresh(&self.config.algorithm_version, max_age, now) {
                return Ok(Some(stored));
            }
        }

        let records: Vec<SentimentRecord> = self
            .stores
            .sentiments
            .sentiments_for_clinic(clinic_id)
            .await?
            .into_iter()
            .map(SentimentRecord::clamped)
            .collect();

        let Some(aggregate) = aggregate::aggregate_sentiments(
            clinic_id,
            &records,
            self.config.min_reviews,
            &self.config.algorithm_version,
            now,
        ) else {
            return Ok(None);
        };
        self.stores.scores.upsert_aggregate(&aggregate).await?;

        let comparison = match treatment {
            Some(treatment) => self.price_comparison(candidate, treatment).await?,
            None => PriceComparison::default(),
        };
        let price_data_points = self.stores.prices.price_data_points(clinic_id).await?;

        let score =
            self.calculator.build_score(clinic_id, &aggregate, comparison, price_data_points, now);
        self.stores.scores.upsert_score(&score).await?;
        Ok(Some(score))
    }

    /// Treatment-qualified clinic mean versus the regional index mean.
    /// Missing data on either side disables the adjustment.
    async fn price_comparison(
        &self,
        candidate: &Candidate,
        treatment: TreatmentType,
    ) -> Result<PriceComparison, StoreError> {
        let observations = self
            .stores
            .prices
            .observations_for_clinic(candidate.clinic.id, Some(treatment))
            .await?;

        let indexable: Vec<i64> = observations
            .iter()
            .filter(|observation| observation.is_indexable())
            .map(|observation| observation.amount)
            .collect();
        let clinic_mean = (!indexable.is_empty())
            .then(|| indexable.iter().sum::<i64>() as f64 / indexable.len() as f64);

        let regional_mean = self
            .price_index
            .get(&candidate.clinic.district, treatment)
            .await?
            .map(|stats| stats.mean_price);

        Ok(PriceComparison { clinic_mean, regional_mean })
    }

    async fn clinic_lock(&self, clinic_id: ClinicId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.clinic_locks.lock().await;
        Arc::clone(locks.entry(clinic_id).or_default())
    }

    /// Drop a clinic's recompute lock once no scorer holds it, so the
    /// registry does not grow unbounded with the clinic population.
    async fn release_clinic_lock(&self, clinic_id: ClinicId) {
        let mut locks = self.clinic_locks.lock().await;
        if let Some(lock) = locks.get(&clinic_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&clinic_id);
            }
        }
    }

    async fn append_log(
        &self,
        validated: &ValidatedRequest,
        context: &RequestContext,
        recommendations: &[RankedClinic],
        elapsed_ms: u64,
        outcome: RequestOutcome,
        error_code: Option<&str>,
    ) {
        let entry = RecommendationLogEntry {
            id: None,
            user_id: context.user_id.clone(),
            district: validated.district.clone(),
            treatment_type: validated.treatment,
            clinic_ids: recommendations.iter().map(|clinic| clinic.clinic_id).collect(),
            algorithm_version: self.config.algorithm_version.clone(),
            response_time_ms: elapsed_ms,
            outcome,
            error_code: error_code.map(str::to_owned),
            request_ip: context.request_ip.clone(),
            user_agent: context.user_agent.clone(),
            created_at: Utc::now(),
        };

        // The log is best-effort; a failed append never fails the request.
        if let Err(error) = self.stores.log.append(&entry).await {
            warn!(error = %error, "failed to append recommendation log entry");
        }
    }
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

fn validate(request: &RecommendationRequest) -> Result<ValidatedRequest, RecommendError> {
    let district = request.district.trim();
    if district.is_empty() {
        return Err(RecommendError::invalid("district", "must not be empty"));
    }

    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(RecommendError::invalid(
            "limit",
            format!("must be between 1 and {MAX_LIMIT}"),
        ));
    }

    let user_location = match request.user_location {
        Some(location) => {
            if !(-90.0..=90.0).contains(&location.latitude) {
                return Err(RecommendError::invalid("latitude", "must be between -90 and 90"));
            }
            if !(-180.0..=180.0).contains(&location.longitude) {
                return Err(RecommendError::invalid("longitude", "must be between -180 and 180"));
            }
            Some((location.latitude, location.longitude))
        }
        None => None,
    };

    Ok(ValidatedRequest {
        district: district.to_owned(),
        treatment: request.treatment_type,
        user_location,
        limit,
    })
}
