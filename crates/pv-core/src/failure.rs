//! # Validation Failure Shape
//!
//! The caller-facing result of a rejected validation:
//!
//! ```json
//! { "code": "invalid_param", "errors": [{ "field": "age", "message": "..." }] }
//! ```
//!
//! HTTP adapters serialize this shape as-is in a 422 response body.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code carried by every validation failure.
pub const INVALID_PARAM: &str = "invalid_param";

/// A single field-addressed validation error.
///
/// `field` is the dotted path from the validated root to the offending
/// value. Root-level errors use the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Structured validation failure raised by the default error policy.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("validation failed with {} error(s)", .errors.len())]
pub struct ValidationFailure {
    pub code: String,
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    /// Build an `invalid_param` failure from translated errors.
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self {
            code: INVALID_PARAM.to_string(),
            errors,
        }
    }

    /// Returns the error reported for `field`, if any.
    pub fn error_for(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }
}
