//! API error type with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::Error;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Request body could not be decoded (400)
    BadBody { message: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Persisted invariant would be breached (422)
    Constraint { field: &'static str, reason: String },

    /// Store or server fault (500, logged)
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "field": e.field(),
                    "message": e.to_string()
                }),
            ),
            Self::BadBody { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "bad_request",
                    "message": message
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Constraint { field, reason } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "constraint_violation",
                    "message": format!("{}: {}", field, reason)
                }),
            ),
            Self::Internal { message } => {
                // Log the actual error, return generic message
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadBody {
            message: e.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::BadBody {
            message: e.body_text(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Validation(v) => Self::Validation(v),
            Error::NotFound { resource, id } => Self::NotFound {
                resource,
                id: id.to_string(),
            },
            Error::ConstraintViolation { field, reason } => Self::Constraint { field, reason },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}
