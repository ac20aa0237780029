use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use denty_core::config::{AppConfig, ConfigError, LoadOptions};
use denty_core::RecommendationEngine;
use denty_db::{connect, migrations, sql_engine_stores, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<RecommendationEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let engine = Arc::new(RecommendationEngine::new(
        config.engine.clone(),
        sql_engine_stores(db_pool.clone()),
    ));
    info!(
        event_name = "system.bootstrap.engine_ready",
        algorithm_version = %config.engine.algorithm_version,
        min_reviews = config.engine.min_reviews,
        "recommendation engine initialized"
    );

    Ok(Application { config, db_pool, engine })
}

#[cfg(test)]
mod tests {
    use denty_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use super::{bootstrap, bootstrap_with_config};

    fn in_memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        // One connection keeps the in-memory database alive across queries.
        config.database.max_connections = 1;
        config
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_builds_the_engine() {
        let app = bootstrap_with_config(in_memory_config())
            .await
            .expect("bootstrap should succeed against in-memory sqlite");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('clinic', 'review', 'clinic_score', 'recommendation_log')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should expose baseline recommendation tables");

        assert_eq!(app.engine.config().algorithm_version, "v1.0");
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_engine_overrides() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                min_reviews: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err(), "min_reviews of zero must fail validation");
    }
}
