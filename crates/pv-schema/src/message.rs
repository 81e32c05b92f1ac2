//! # Error Translator
//!
//! Converts raw engine failures into field-addressed [`FieldError`]s.
//!
//! | keyword            | message                                   |
//! |--------------------|-------------------------------------------|
//! | `required`         | `required` (field is the missing property)|
//! | `enum`             | `must be one of a,b,c`                    |
//! | `maxLength`        | `must have fewer than N characters`       |
//! | `minLength`        | `must have more than N characters`        |
//! | `const`            | `must be equal to X`                      |
//! | `maximum`          | `must be less than or equal to N`         |
//! | `minimum`          | `must be greater than or equal to N`      |
//! | `exclusiveMaximum` | `must be less than N`                     |
//! | `exclusiveMinimum` | `must be greater than N`                  |
//! | `multipleOf`       | `must be multiple of N`                   |
//! | `pattern`          | `does not match pattern`                  |
//! | `maxItems`         | `must have fewer than N items`            |
//! | `minItems`         | `must have more than N items`             |
//!
//! Anything else keeps the engine's message.

use pv_core::FieldError;
use serde_json::Value;

use crate::engine::{FailureKind, RawFailure};

/// Translate failures, preserving their order.
pub fn convert_errors(failures: &[RawFailure]) -> Vec<FieldError> {
    failures.iter().map(convert_error).collect()
}

fn convert_error(failure: &RawFailure) -> FieldError {
    let field = field_path(&failure.instance_path);
    let message = match &failure.kind {
        FailureKind::Required { property } => {
            let field = if field.is_empty() {
                property.clone()
            } else {
                format!("{field}.{property}")
            };
            return FieldError::new(field, "required");
        }
        FailureKind::Enum { allowed } => {
            let allowed = allowed
                .as_array()
                .map(|values| values.iter().map(display).collect::<Vec<_>>().join(","))
                .unwrap_or_default();
            format!("must be one of {allowed}")
        }
        FailureKind::MaxLength { limit } => {
            format!("must have fewer than {} characters", display(limit))
        }
        FailureKind::MinLength { limit } => {
            format!("must have more than {} characters", display(limit))
        }
        FailureKind::Const { expected } => format!("must be equal to {}", display(expected)),
        FailureKind::Maximum { limit } => {
            format!("must be less than or equal to {}", display(limit))
        }
        FailureKind::Minimum { limit } => {
            format!("must be greater than or equal to {}", display(limit))
        }
        FailureKind::ExclusiveMaximum { limit } => format!("must be less than {}", display(limit)),
        FailureKind::ExclusiveMinimum { limit } => {
            format!("must be greater than {}", display(limit))
        }
        FailureKind::MultipleOf { multiple_of } => {
            format!("must be multiple of {}", display(multiple_of))
        }
        FailureKind::Pattern { .. } => "does not match pattern".to_string(),
        FailureKind::MaxItems { limit } => format!("must have fewer than {} items", display(limit)),
        FailureKind::MinItems { limit } => format!("must have more than {} items", display(limit)),
        FailureKind::Custom | FailureKind::Other { .. } => failure.message.clone(),
    };
    FieldError::new(field, message)
}

/// `/a/b/0` becomes `a.b.0`; the root pointer becomes `""`.
pub fn field_path(pointer: &str) -> String {
    let trimmed = pointer.strip_prefix('/').unwrap_or(pointer);
    if trimmed.is_empty() {
        return String::new();
    }
    trimmed
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

/// Strings unquoted, integral floats without a fractional part.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(kind: FailureKind, path: &str) -> RawFailure {
        RawFailure {
            kind,
            instance_path: path.to_string(),
            message: "engine says no".to_string(),
        }
    }

    #[test]
    fn field_paths() {
        assert_eq!(field_path(""), "");
        assert_eq!(field_path("/age"), "age");
        assert_eq!(field_path("/user/tags/0"), "user.tags.0");
        assert_eq!(field_path("/a~1b"), "a/b");
    }

    #[test]
    fn required_points_at_missing_property() {
        let root = raw(FailureKind::Required { property: "email".into() }, "");
        let nested = raw(FailureKind::Required { property: "city".into() }, "/address");
        let errors = convert_errors(&[root, nested]);
        assert_eq!(errors[0], FieldError::new("email", "required"));
        assert_eq!(errors[1], FieldError::new("address.city", "required"));
    }

    #[test]
    fn templated_messages() {
        let cases = [
            (FailureKind::Enum { allowed: json!(["a", "b", 3]) }, "must be one of a,b,3"),
            (FailureKind::MaxLength { limit: json!(10) }, "must have fewer than 10 characters"),
            (FailureKind::MinLength { limit: json!(2) }, "must have more than 2 characters"),
            (FailureKind::Const { expected: json!("on") }, "must be equal to on"),
            (FailureKind::Maximum { limit: json!(5) }, "must be less than or equal to 5"),
            (FailureKind::Minimum { limit: json!(0) }, "must be greater than or equal to 0"),
            (FailureKind::ExclusiveMaximum { limit: json!(1.5) }, "must be less than 1.5"),
            (FailureKind::ExclusiveMinimum { limit: json!(0.0) }, "must be greater than 0"),
            (FailureKind::MultipleOf { multiple_of: json!(3) }, "must be multiple of 3"),
            (FailureKind::Pattern { pattern: "^a".into() }, "does not match pattern"),
            (FailureKind::MaxItems { limit: json!(4) }, "must have fewer than 4 items"),
            (FailureKind::MinItems { limit: json!(1) }, "must have more than 1 items"),
        ];
        for (kind, expected) in cases {
            let errors = convert_errors(&[raw(kind, "/x")]);
            assert_eq!(errors[0], FieldError::new("x", expected));
        }
    }

    #[test]
    fn unknown_keywords_keep_engine_message() {
        let errors = convert_errors(&[raw(FailureKind::Other { keyword: "type".into() }, "")]);
        assert_eq!(errors[0], FieldError::new("", "engine says no"));
    }
}
