//! Error types for the gateway layer

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use doodates_analytics::AnalyticsError;
use doodates_polls::PollError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Conflict(_) => "conflict",
            GatewayError::Unprocessable(_) => "unprocessable",
            GatewayError::ServiceUnavailable(_) => "service_unavailable",
            GatewayError::InternalError(_) => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<PollError> for GatewayError {
    fn from(err: PollError) -> Self {
        let message = err.to_string();
        match err {
            PollError::PollNotFound { .. } | PollError::ConversationNotFound { .. } => {
                GatewayError::NotFound(message)
            }
            PollError::Cancelled { .. } => GatewayError::InvalidRequest(format!(
                "{message}: send {{\"confirm\": true}} to proceed"
            )),
            PollError::InvalidTransition { .. } | PollError::DuplicateSlug { .. } => {
                GatewayError::Conflict(message)
            }
            PollError::Validation { .. }
            | PollError::UnsupportedAction { .. }
            | PollError::NothingToExport { .. } => GatewayError::Unprocessable(message),
            PollError::Database(_)
            | PollError::Clipboard { .. }
            | PollError::Serialization(_)
            | PollError::Internal { .. } => {
                error!(error = %message, "poll operation failed");
                GatewayError::InternalError(message)
            }
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::InvalidRequest(rejection.body_text())
    }
}

impl From<AnalyticsError> for GatewayError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::Storage(inner) => inner.into(),
            AnalyticsError::PollNotFound(id) => GatewayError::NotFound(format!("Poll not found: {id}")),
            AnalyticsError::EmptyQuestion => GatewayError::InvalidRequest(err.to_string()),
            AnalyticsError::NotInitialized
            | AnalyticsError::Http(_)
            | AnalyticsError::Api { .. }
            | AnalyticsError::InvalidResponse(_)
            | AnalyticsError::Json(_)
            | AnalyticsError::Insights(_) => GatewayError::ServiceUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doodates_polls::{PollStatus, PollType};

    #[test]
    fn test_poll_error_statuses() {
        let cases = [
            (PollError::poll_not_found("p1"), StatusCode::NOT_FOUND),
            (PollError::cancelled("close"), StatusCode::BAD_REQUEST),
            (
                PollError::InvalidTransition {
                    from: PollStatus::Archived,
                    to: PollStatus::Closed,
                },
                StatusCode::CONFLICT,
            ),
            (PollError::duplicate_slug("abc"), StatusCode::CONFLICT),
            (
                PollError::unsupported("export", PollType::Date),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (PollError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(GatewayError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_analytics_error_statuses() {
        assert_eq!(
            GatewayError::from(AnalyticsError::NotInitialized).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::from(AnalyticsError::EmptyQuestion).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::from(AnalyticsError::Storage(PollError::poll_not_found("x"))).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
