use thiserror::Error;

use crate::store::StoreError;

/// Failure taxonomy for the recommendation boundary.
///
/// Per-clinic scoring failures are absorbed inside the engine; only
/// request-level failures surface here. `InvalidInput` carries the offending
/// field so callers can report per-field detail.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RecommendError {
    #[error("invalid input for `{field}`: {message}")]
    InvalidInput { field: &'static str, message: String },
    #[error("backing store unavailable: {0}")]
    BackendUnavailable(String),
    #[error("request deadline expired after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecommendError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput { field, message: message.into() }
    }

    /// Stable wire-level error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "입력 데이터가 올바르지 않습니다",
            Self::BackendUnavailable(_) => "서비스가 일시적으로 불안정합니다. 잠시 후 다시 시도해주세요",
            Self::Timeout { .. } => "요청 처리 시간이 초과되었습니다",
            Self::Internal(_) => "추천 처리 중 오류가 발생했습니다",
        }
    }
}

impl From<StoreError> for RecommendError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(message) => Self::BackendUnavailable(message),
            StoreError::Decode(message) => Self::Internal(message),
        }
    }
}
