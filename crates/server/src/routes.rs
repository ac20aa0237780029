//! JSON API routes.
//!
//! Endpoints:
//! - `POST /api/recommend`: ranked clinic recommendations for a district
//! - `GET  /api/prices/compare`: regional price statistics for a treatment
//! - `POST /api/feedback`: record feedback on a recommended clinic

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use denty_core::domain::price::{RegionalPriceStats, TreatmentType};
use denty_core::{
    classify_price, PriceLevel, RecommendError, RecommendationFeedback, RecommendationRequest,
    RecommendationResponse, RequestContext, RecommendationEngine,
};

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<RecommendationEngine>,
}

pub fn router(engine: Arc<RecommendationEngine>) -> Router {
    Router::new()
        .route("/api/recommend", post(recommend))
        .route("/api/prices/compare", get(compare_prices))
        .route("/api/feedback", post(submit_feedback))
        .with_state(ApiState { engine })
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: ApiErrorDetail,
    pub metadata: ApiErrorMetadata,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMetadata {
    pub response_time_ms: u64,
}

pub type ApiError = (StatusCode, Json<ApiErrorBody>);

fn api_error(error: &RecommendError, started: Instant) -> ApiError {
    let status = match error {
        RecommendError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        RecommendError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RecommendError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RecommendError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiErrorBody {
            success: false,
            error: ApiErrorDetail { code: error.code(), message: error.user_message() },
            metadata: ApiErrorMetadata {
                response_time_ms: started.elapsed().as_millis() as u64,
            },
        }),
    )
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    let header_str = |name: &str| {
        headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
    };
    RequestContext {
        user_id: header_str("x-user-id"),
        request_ip: header_str("x-forwarded-for")
            .map(|raw| raw.split(',').next().unwrap_or("").trim().to_owned()),
        user_agent: header_str("user-agent"),
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendBody {
    pub success: bool,
    #[serde(flatten)]
    pub response: RecommendationResponse,
}

pub async fn recommend(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendBody>, ApiError> {
    let started = Instant::now();
    let correlation_id = Uuid::new_v4();
    let context = request_context(&headers);
    info!(
        event_name = "api.recommend.received",
        correlation_id = %correlation_id,
        district = %request.district,
        "recommendation request received"
    );

    let response = state.engine.recommend(request, context).await.map_err(|error| {
        warn!(
            event_name = "api.recommend.failed",
            correlation_id = %correlation_id,
            error_code = error.code(),
            "recommendation request failed"
        );
        api_error(&error, started)
    })?;
    Ok(Json(RecommendBody { success: true, response }))
}

#[derive(Debug, Deserialize)]
pub struct PriceCompareQuery {
    pub district: String,
    pub treatment_type: String,
    /// Optional quoted price to classify against the district quartiles.
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PriceCompareBody {
    pub success: bool,
    pub available: bool,
    pub treatment_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RegionalPriceStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_level: Option<PriceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

pub async fn compare_prices(
    State(state): State<ApiState>,
    Query(query): Query<PriceCompareQuery>,
) -> Result<Json<PriceCompareBody>, ApiError> {
    let started = Instant::now();
    let treatment: TreatmentType = query.treatment_type.parse().map_err(|_| {
        api_error(&RecommendError::invalid("treatment_type", "unknown treatment type"), started)
    })?;

    let stats = state
        .engine
        .regional_price_stats(&query.district, treatment)
        .await
        .map_err(|error| api_error(&error, started))?;

    let body = match stats {
        Some(stats) => {
            let price_level = query.amount.map(|amount| classify_price(amount, &stats));
            PriceCompareBody {
                success: true,
                available: true,
                treatment_label: treatment.label(),
                stats: Some(stats),
                price_level,
                message: None,
            }
        }
        None => PriceCompareBody {
            success: true,
            available: false,
            treatment_label: treatment.label(),
            stats: None,
            price_level: None,
            message: Some("해당 지역의 가격 데이터가 충분하지 않습니다"),
        },
    };
    Ok(Json(body))
}

#[derive(Debug, Serialize)]
pub struct FeedbackBody {
    pub success: bool,
}

pub async fn submit_feedback(
    State(state): State<ApiState>,
    Json(feedback): Json<RecommendationFeedback>,
) -> Result<Json<FeedbackBody>, ApiError> {
    let started = Instant::now();
    let log_id = feedback.log_id;
    let clinic_id = feedback.clinic_id;
    state.engine.submit_feedback(feedback).await.map_err(|error| api_error(&error, started))?;
    info!(
        event_name = "api.feedback.recorded",
        log_id,
        clinic_id = %clinic_id,
        "recommendation feedback recorded"
    );
    Ok(Json(FeedbackBody { success: true }))
}
