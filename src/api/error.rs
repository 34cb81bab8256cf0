//! Unified API error handling
//!
//! This module provides a consistent error response format across all API endpoints.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::DocumentError;
use crate::service::workflow::WorkflowError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

/// Unified API error type
///
/// All API endpoints return `Result<T, ApiError>` for consistent error handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Another operation holds the session (409)
    #[error("{0}")]
    Conflict(String),

    /// The model answered but produced nothing usable (422)
    #[error("{0}")]
    EmptyResult(String),

    /// Model API failure or unusable reply (502)
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Missing or invalid service configuration (500)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::EmptyResult(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::EmptyResult(_) => "empty_result",
            ApiError::ExternalService(_) => "external_service_error",
            ApiError::Configuration(_) => "configuration_error",
            ApiError::Internal(_) => "internal_error",
        };

        if status.is_server_error() {
            tracing::error!(
                error_type = error_type,
                status = status.as_u16(),
                message = %self,
                "API error"
            );
        } else {
            tracing::warn!(
                error_type = error_type,
                status = status.as_u16(),
                message = %self,
                "API request rejected"
            );
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id: Uuid::new_v4().to_string(),
        })
    }
}

// ============================================================================
// From conversions for service errors
// ============================================================================

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Input(msg) => ApiError::BadRequest(msg),
            WorkflowError::NotFound(msg) => ApiError::NotFound(msg),
            WorkflowError::Busy(_) | WorkflowError::Superseded(_) => {
                ApiError::Conflict(err.to_string())
            }
            WorkflowError::EmptyResult(msg) => ApiError::EmptyResult(msg),
            WorkflowError::RemoteApi(msg) | WorkflowError::MalformedResponse(msg) => {
                ApiError::ExternalService(msg)
            }
            WorkflowError::Configuration(msg) => ApiError::Configuration(msg),
            WorkflowError::Storage(_) | WorkflowError::Internal(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::workflow::Operation;

    #[test]
    fn test_workflow_errors_map_to_status_codes() {
        let cases = [
            (WorkflowError::Input("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (WorkflowError::Busy(Operation::Extraction), StatusCode::CONFLICT),
            (WorkflowError::Superseded(Operation::Verification), StatusCode::CONFLICT),
            (WorkflowError::EmptyResult("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (WorkflowError::RemoteApi("x".into()), StatusCode::BAD_GATEWAY),
            (WorkflowError::MalformedResponse("x".into()), StatusCode::BAD_GATEWAY),
            (WorkflowError::Configuration("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (WorkflowError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_error_body_carries_type_and_message() {
        let response = ApiError::EmptyResult("nothing found".into()).error_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
