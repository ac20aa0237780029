//! SQLite persistence for denty: pool management, migrations, the store
//! trait implementations, and deterministic demo fixtures.

pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{seed_demo_dataset, SeedSummary};
pub use repositories::{
    sql_engine_stores, SqlClinicDirectory, SqlFeedbackStore, SqlPriceStore,
    SqlRecommendationLogStore, SqlScoreStore, SqlSentimentStore,
};
