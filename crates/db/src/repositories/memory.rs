//! In-memory store implementations backing engine tests.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use denty_core::domain::clinic::{Clinic, ClinicId};
use denty_core::domain::price::{PriceObservation, RegionalPriceStats, TreatmentType};
use denty_core::domain::recommendation::{RecommendationFeedback, RecommendationLogEntry};
use denty_core::domain::score::{AspectAggregate, ClinicScore};
use denty_core::domain::sentiment::SentimentRecord;
use denty_core::store::{
    ClinicDirectory, FeedbackStore, PriceStore, RecommendationLogStore, ScoreStore,
    SentimentStore, StoreError,
};

#[derive(Default)]
pub struct InMemoryClinicDirectory {
    clinics: RwLock<Vec<Clinic>>,
    review_counts: RwLock<HashMap<ClinicId, u32>>,
}

impl InMemoryClinicDirectory {
    pub async fn add_clinic(&self, clinic: Clinic, review_count: u32) {
        self.review_counts.write().await.insert(clinic.id, review_count);
        self.clinics.write().await.push(clinic);
    }
}

#[async_trait::async_trait]
impl ClinicDirectory for InMemoryClinicDirectory {
    async fn clinics_in_district(&self, district: &str) -> Result<Vec<Clinic>, StoreError> {
        let needle = district.trim().to_lowercase();
        let clinics = self.clinics.read().await;
        Ok(clinics
            .iter()
            .filter(|clinic| clinic.district.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn review_counts(
        &self,
        clinic_ids: &[ClinicId],
    ) -> Result<HashMap<ClinicId, u32>, StoreError> {
        let counts = self.review_counts.read().await;
        Ok(clinic_ids
            .iter()
            .filter_map(|id| counts.get(id).map(|count| (*id, *count)))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySentimentStore {
    records: RwLock<HashMap<ClinicId, Vec<SentimentRecord>>>,
}

impl InMemorySentimentStore {
    pub async fn add_records(&self, clinic_id: ClinicId, records: Vec<SentimentRecord>) {
        self.records.write().await.entry(clinic_id).or_default().extend(records);
    }
}

#[async_trait::async_trait]
impl SentimentStore for InMemorySentimentStore {
    async fn sentiments_for_clinic(
        &self,
        clinic_id: ClinicId,
    ) -> Result<Vec<SentimentRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&clinic_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryPriceStore {
    observations: RwLock<Vec<PriceObservation>>,
    districts: RwLock<HashMap<ClinicId, String>>,
    stats: RwLock<HashMap<(String, TreatmentType), RegionalPriceStats>>,
}

impl InMemoryPriceStore {
    pub async fn add_observation(&self, observation: PriceObservation, district: &str) {
        self.districts.write().await.insert(observation.clinic_id, district.to_owned());
        self.observations.write().await.push(observation);
    }
}

#[async_trait::async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn observations_for_clinic(
        &self,
        clinic_id: ClinicId,
        treatment: Option<TreatmentType>,
    ) -> Result<Vec<PriceObservation>, StoreError> {
        let observations = self.observations.read().await;
        Ok(observations
            .iter()
            .filter(|obs| {
                obs.clinic_id == clinic_id
                    && treatment.map_or(true, |t| obs.treatment_type == t)
            })
            .cloned()
            .collect())
    }

    async fn indexable_prices_in_district(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Vec<i64>, StoreError> {
        let needle = district.trim().to_lowercase();
        let districts = self.districts.read().await;
        let observations = self.observations.read().await;
        Ok(observations
            .iter()
            .filter(|obs| {
                obs.treatment_type == treatment
                    && obs.is_indexable()
                    && districts
                        .get(&obs.clinic_id)
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .map(|obs| obs.amount)
            .collect())
    }

    async fn clinics_with_price_data(
        &self,
        clinic_ids: &[ClinicId],
        treatment: TreatmentType,
    ) -> Result<HashSet<ClinicId>, StoreError> {
        let observations = self.observations.read().await;
        Ok(clinic_ids
            .iter()
            .filter(|id| {
                observations
                    .iter()
                    .any(|obs| obs.clinic_id == **id && obs.treatment_type == treatment)
            })
            .copied()
            .collect())
    }

    async fn price_data_points(&self, clinic_id: ClinicId) -> Result<u32, StoreError> {
        let observations = self.observations.read().await;
        Ok(observations.iter().filter(|obs| obs.clinic_id == clinic_id).count() as u32)
    }

    async fn find_regional_stats(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Option<RegionalPriceStats>, StoreError> {
        let stats = self.stats.read().await;
        Ok(stats.get(&(district.trim().to_owned(), treatment)).cloned())
    }

    async fn upsert_regional_stats(&self, stats: &RegionalPriceStats) -> Result<(), StoreError> {
        let mut map = self.stats.write().await;
        map.insert((stats.district.trim().to_owned(), stats.treatment_type), stats.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryScoreStore {
    scores: RwLock<HashMap<ClinicId, ClinicScore>>,
    aggregates: RwLock<HashMap<ClinicId, AspectAggregate>>,
}

impl InMemoryScoreStore {
    pub async fn seed_score(&self, score: ClinicScore) {
        self.scores.write().await.insert(score.clinic_id, score);
    }
}

#[async_trait::async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn find_score(&self, clinic_id: ClinicId) -> Result<Option<ClinicScore>, StoreError> {
        Ok(self.scores.read().await.get(&clinic_id).cloned())
    }

    async fn upsert_score(&self, score: &ClinicScore) -> Result<(), StoreError> {
        self.scores.write().await.insert(score.clinic_id, score.clone());
        Ok(())
    }

    async fn find_aggregate(
        &self,
        clinic_id: ClinicId,
    ) -> Result<Option<AspectAggregate>, StoreError> {
        Ok(self.aggregates.read().await.get(&clinic_id).cloned())
    }

    async fn upsert_aggregate(&self, aggregate: &AspectAggregate) -> Result<(), StoreError> {
        self.aggregates.write().await.insert(aggregate.clinic_id, aggregate.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRecommendationLogStore {
    entries: RwLock<Vec<RecommendationLogEntry>>,
}

impl InMemoryRecommendationLogStore {
    pub async fn entries(&self) -> Vec<RecommendationLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait::async_trait]
impl RecommendationLogStore for InMemoryRecommendationLogStore {
    async fn append(&self, entry: &RecommendationLogEntry) -> Result<i64, StoreError> {
        let mut entries = self.entries.write().await;
        let id = entries.len() as i64 + 1;
        let mut entry = entry.clone();
        entry.id = Some(id);
        entries.push(entry);
        Ok(id)
    }
}

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    feedback: RwLock<HashMap<(i64, ClinicId), RecommendationFeedback>>,
}

#[async_trait::async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn upsert(&self, feedback: &RecommendationFeedback) -> Result<(), StoreError> {
        let mut map = self.feedback.write().await;
        map.insert((feedback.log_id, feedback.clinic_id), feedback.clone());
        Ok(())
    }

    async fn find(
        &self,
        log_id: i64,
        clinic_id: ClinicId,
    ) -> Result<Option<RecommendationFeedback>, StoreError> {
        Ok(self.feedback.read().await.get(&(log_id, clinic_id)).cloned())
    }
}
