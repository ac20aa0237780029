use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::clinic::ClinicId;
use crate::domain::price::TreatmentType;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Incoming recommendation query, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub district: String,
    #[serde(default)]
    pub treatment_type: Option<TreatmentType>,
    #[serde(default)]
    pub user_location: Option<UserLocation>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Caller identity attached to the recommendation log, never to ranking.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    pub user_id: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// One ranked result row, fully denormalized for the response payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedClinic {
    pub clinic_id: ClinicId,
    pub clinic_name: String,
    pub clinic_address: String,
    pub clinic_phone: String,
    pub district: String,
    pub composite_score: f64,
    pub price_competitiveness: f64,
    pub medical_skill: f64,
    pub overtreatment_risk: f64,
    pub patient_satisfaction: f64,
    pub review_count: u32,
    pub distance_km: Option<f64>,
    pub has_parking: bool,
    pub night_service: bool,
    pub weekend_service: bool,
    pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMetadata {
    pub district: String,
    pub treatment_type: Option<TreatmentType>,
    pub total_count: u32,
    pub response_time_ms: u64,
    pub algorithm_version: String,
    /// Set when the result set is empty, explaining why to the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RankedClinic>,
    pub metadata: RecommendationMetadata,
}

/// Terminal state of one recommendation request, recorded in the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Ok,
    Timeout,
    Error,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for RequestOutcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ok" => Ok(Self::Ok),
            "timeout" => Ok(Self::Timeout),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown request outcome `{other}`")),
        }
    }
}

/// Append-only audit row. Carries the full returned clinic id list and the
/// algorithm version so historical rankings stay reproducible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationLogEntry {
    pub id: Option<i64>,
    pub user_id: Option<String>,
    pub district: String,
    pub treatment_type: Option<TreatmentType>,
    pub clinic_ids: Vec<ClinicId>,
    pub algorithm_version: String,
    pub response_time_ms: u64,
    pub outcome: RequestOutcome,
    pub error_code: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Helpful,
    NotHelpful,
    Inaccurate,
    MissingInfo,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Helpful => "helpful",
            Self::NotHelpful => "not_helpful",
            Self::Inaccurate => "inaccurate",
            Self::MissingInfo => "missing_info",
        }
    }
}

impl std::str::FromStr for FeedbackType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "helpful" => Ok(Self::Helpful),
            "not_helpful" => Ok(Self::NotHelpful),
            "inaccurate" => Ok(Self::Inaccurate),
            "missing_info" => Ok(Self::MissingInfo),
            other => Err(format!("unknown feedback type `{other}`")),
        }
    }
}

/// User feedback on one recommended clinic, upserted by (log_id, clinic_id).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationFeedback {
    pub log_id: i64,
    pub clinic_id: ClinicId,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub did_visit: Option<bool>,
    #[serde(default)]
    pub visit_rating: Option<u8>,
}

impl RecommendationFeedback {
    /// Ratings are only meaningful after a visit and sit in [1, 5].
    pub fn validate(&self) -> Result<(), crate::errors::RecommendError> {
        if let Some(rating) = self.visit_rating {
            if !(1..=5).contains(&rating) {
                return Err(crate::errors::RecommendError::invalid(
                    "visit_rating",
                    "must be between 1 and 5",
                ));
            }
        }
        Ok(())
    }
}
