//! Liveness and readiness reporting for the HTTP runtime.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use denty_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: DateTime<Utc>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let degraded = database.status != "ready";

    let response = HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        service: HealthCheck {
            status: "ready",
            detail: "denty-server runtime initialized".to_string(),
        },
        database,
        checked_at: Utc::now(),
    };

    let code = if degraded { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };
    (code, Json(response))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database reachable".to_string() },
        Err(error) => HealthCheck { status: "degraded", detail: format!("database check failed: {error}") },
    }
}

#[cfg(test)]
mod tests {
    use denty_db::connect_with_settings;

    use super::*;

    #[tokio::test]
    async fn health_reports_ok_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let (code, Json(response)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(response.status, "ok");
        assert_eq!(response.database.status, "ready");
    }

    #[tokio::test]
    async fn health_reports_degraded_when_database_is_closed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        pool.close().await;

        let (code, Json(response)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status, "degraded");
        assert_eq!(response.database.status, "degraded");
    }
}
