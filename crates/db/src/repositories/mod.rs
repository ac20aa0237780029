//! SQLite implementations of the `denty-core` store traits.
//!
//! Query failures surface as `StoreError::Unavailable`; per-column decode
//! failures surface as `StoreError::Decode` so the engine can drop a single
//! malformed clinic instead of failing the request.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use denty_core::domain::price::TreatmentType;
use denty_core::store::StoreError;
use denty_core::EngineStores;

use crate::DbPool;

pub mod clinic;
pub mod feedback;
pub mod log;
pub mod memory;
pub mod price;
pub mod score;
pub mod sentiment;

pub use clinic::SqlClinicDirectory;
pub use feedback::SqlFeedbackStore;
pub use log::SqlRecommendationLogStore;
pub use memory::{
    InMemoryClinicDirectory, InMemoryFeedbackStore, InMemoryPriceStore,
    InMemoryRecommendationLogStore, InMemoryScoreStore, InMemorySentimentStore,
};
pub use price::SqlPriceStore;
pub use score::SqlScoreStore;
pub use sentiment::SqlSentimentStore;

/// The full SQLite-backed store bundle over one pool.
pub fn sql_engine_stores(pool: DbPool) -> EngineStores {
    EngineStores {
        clinics: Arc::new(SqlClinicDirectory::new(pool.clone())),
        sentiments: Arc::new(SqlSentimentStore::new(pool.clone())),
        prices: Arc::new(SqlPriceStore::new(pool.clone())),
        scores: Arc::new(SqlScoreStore::new(pool.clone())),
        log: Arc::new(SqlRecommendationLogStore::new(pool.clone())),
        feedback: Arc::new(SqlFeedbackStore::new(pool)),
    }
}

pub(crate) fn db_err(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> StoreError {
    StoreError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_err(format!("bad timestamp `{raw}`: {e}")))
}

pub(crate) fn parse_treatment(raw: &str) -> Result<TreatmentType, StoreError> {
    raw.parse::<TreatmentType>().map_err(decode_err)
}

/// `?, ?, ...` for a dynamic IN clause.
pub(crate) fn in_placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count.saturating_mul(3));
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}
