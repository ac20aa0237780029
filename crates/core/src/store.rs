//! Store trait seams the engine depends on.
//!
//! The ORM back-references of the ancestor system are replaced with an
//! explicit read model: flat batch lookups keyed by clinic id, no
//! back-pointers. `denty-db` provides the SQLite implementations; in-memory
//! doubles live there too for engine tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::clinic::{Clinic, ClinicId};
use crate::domain::price::{PriceObservation, RegionalPriceStats, TreatmentType};
use crate::domain::recommendation::{RecommendationFeedback, RecommendationLogEntry};
use crate::domain::score::{AspectAggregate, ClinicScore};
use crate::domain::sentiment::SentimentRecord;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store is unreachable; propagates to the caller.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A row failed to decode; absorbed per-clinic where possible.
    #[error("row decode failed: {0}")]
    Decode(String),
}

/// Read access to the clinic directory.
#[async_trait]
pub trait ClinicDirectory: Send + Sync {
    /// Clinics whose district label contains `district`, case-insensitively.
    async fn clinics_in_district(&self, district: &str) -> Result<Vec<Clinic>, StoreError>;

    /// Processed, non-duplicate, non-flagged review counts per clinic.
    /// Clinics absent from the map have zero qualifying reviews.
    async fn review_counts(
        &self,
        clinic_ids: &[ClinicId],
    ) -> Result<HashMap<ClinicId, u32>, StoreError>;
}

/// Read access to per-review sentiment vectors.
#[async_trait]
pub trait SentimentStore: Send + Sync {
    /// Sentiment vectors for every processed, non-duplicate, non-flagged
    /// review of the clinic, as one flat batch.
    async fn sentiments_for_clinic(
        &self,
        clinic_id: ClinicId,
    ) -> Result<Vec<SentimentRecord>, StoreError>;
}

/// Read access to price observations plus persistence for derived
/// regional statistics.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn observations_for_clinic(
        &self,
        clinic_id: ClinicId,
        treatment: Option<TreatmentType>,
    ) -> Result<Vec<PriceObservation>, StoreError>;

    /// Indexable (verified, non-outlier) prices across a district for one
    /// treatment, unsorted.
    async fn indexable_prices_in_district(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Vec<i64>, StoreError>;

    /// Which of the given clinics carry at least one observation for the
    /// treatment. Drives the soft treatment filter.
    async fn clinics_with_price_data(
        &self,
        clinic_ids: &[ClinicId],
        treatment: TreatmentType,
    ) -> Result<HashSet<ClinicId>, StoreError>;

    async fn price_data_points(&self, clinic_id: ClinicId) -> Result<u32, StoreError>;

    async fn find_regional_stats(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Option<RegionalPriceStats>, StoreError>;

    async fn upsert_regional_stats(&self, stats: &RegionalPriceStats) -> Result<(), StoreError>;
}

/// Persistence for derived per-clinic aggregates and scores.
/// Upserts are last-writer-wins on the clinic id.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn find_score(&self, clinic_id: ClinicId) -> Result<Option<ClinicScore>, StoreError>;

    async fn upsert_score(&self, score: &ClinicScore) -> Result<(), StoreError>;

    async fn find_aggregate(
        &self,
        clinic_id: ClinicId,
    ) -> Result<Option<AspectAggregate>, StoreError>;

    async fn upsert_aggregate(&self, aggregate: &AspectAggregate) -> Result<(), StoreError>;
}

/// Append-only recommendation request log.
#[async_trait]
pub trait RecommendationLogStore: Send + Sync {
    /// Appends the entry and returns its row id.
    async fn append(&self, entry: &RecommendationLogEntry) -> Result<i64, StoreError>;
}

/// Feedback upserts keyed by (log_id, clinic_id).
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn upsert(&self, feedback: &RecommendationFeedback) -> Result<(), StoreError>;

    async fn find(
        &self,
        log_id: i64,
        clinic_id: ClinicId,
    ) -> Result<Option<RecommendationFeedback>, StoreError>;
}
