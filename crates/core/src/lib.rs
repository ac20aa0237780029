//! Denty core: the dental-clinic recommendation engine.
//!
//! This crate holds the domain model, configuration, error taxonomy, the
//! store trait seams, and the recommendation pipeline itself. Persistence
//! lives in `denty-db`; HTTP wiring lives in `denty-server`.

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod store;

pub use config::{AppConfig, ConfigError, EngineConfig, LoadOptions};
pub use domain::clinic::{Clinic, ClinicId};
pub use domain::price::{PriceObservation, RegionalPriceStats, TreatmentType};
pub use domain::recommendation::{
    FeedbackType, RankedClinic, RecommendationFeedback, RecommendationLogEntry,
    RecommendationMetadata, RecommendationRequest, RecommendationResponse, RequestContext,
    RequestOutcome, UserLocation,
};
pub use domain::score::{AspectAggregate, ClinicScore};
pub use domain::sentiment::SentimentRecord;
pub use engine::cache::{CacheKey, RankingCache};
pub use engine::price_index::{classify_price, PriceLevel, RegionalPriceIndex};
pub use engine::scoring::{ScoreCalculator, ScoreWeights};
pub use engine::{EngineStores, RecommendationEngine};
pub use errors::RecommendError;
pub use store::{
    ClinicDirectory, FeedbackStore, PriceStore, RecommendationLogStore, ScoreStore,
    SentimentStore, StoreError,
};
