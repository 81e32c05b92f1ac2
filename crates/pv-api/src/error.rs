//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Validation failures keep the `invalid_param` shape produced by
//! `pv-schema`, with the field errors carried in the response body.
//! Internal error details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pv_core::{FieldError, ValidationFailure, INVALID_PARAM};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `invalid_param`, `bad_request`).
    pub code: String,
    pub message: String,
    /// Field errors, present only for validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request data failed schema validation (422).
    #[error("{0}")]
    Validation(ValidationFailure),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Route or resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, INVALID_PARAM),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let errors = match self {
            Self::Validation(failure) => failure.errors,
            _ => Vec::new(),
        };

        let body = ErrorBody {
            code: code.to_string(),
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(failure: ValidationFailure) -> Self {
        Self::Validation(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_status_code() {
        let err = ApiError::from(ValidationFailure::new(vec![FieldError::new("age", "required")]));
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "invalid_param");
    }

    #[test]
    fn bad_request_status_code() {
        let err = ApiError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "bad_request");
    }

    #[test]
    fn not_found_status_code() {
        let err = ApiError::NotFound("no such route".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "not_found");
    }

    #[test]
    fn internal_status_code() {
        let err = ApiError::Internal("validator missing".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "internal_error");
    }

    #[test]
    fn validation_display_counts_errors() {
        let err = ApiError::from(ValidationFailure::new(vec![
            FieldError::new("a", "required"),
            FieldError::new("b", "required"),
        ]));
        assert_eq!(err.to_string(), "validation failed with 2 error(s)");
    }

    #[test]
    fn error_body_omits_empty_errors() {
        let body = ErrorBody {
            code: "bad_request".to_string(),
            message: "bad request: eof".to_string(),
            errors: Vec::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("errors").is_none());
        assert_eq!(json["code"], "bad_request");
    }

    #[test]
    fn internal_response_hides_message() {
        let response = ApiError::Internal("secret detail".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
