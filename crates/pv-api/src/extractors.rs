//! # Extractors & Argument Binding
//!
//! Helpers that run request data through compiled validators, and
//! [`bind_args`], which lays request parts out as positional arguments
//! for an intercepted method.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use pv_schema::CompiledValidator;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// Extract a JSON body, mapping deserialization errors to [`ApiError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., ApiError> {
///     let req = extract_json(body)?;
///     // use req...
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| ApiError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it, returning the body with defaults
/// and transforms applied.
pub fn extract_validated_json(
    result: Result<Json<Value>, JsonRejection>,
    validator: &CompiledValidator,
) -> Result<Value, ApiError> {
    let mut value = extract_json(result)?;
    validator.check(&mut value)?;
    Ok(value)
}

/// [`extract_validated_json`], then deserialize the validated body into `T`.
pub fn extract_validated<T: DeserializeOwned>(
    result: Result<Json<Value>, JsonRejection>,
    validator: &CompiledValidator,
) -> Result<T, ApiError> {
    let value = extract_validated_json(result, validator)?;
    serde_json::from_value(value).map_err(|err| ApiError::BadRequest(err.to_string()))
}

/// Where a positional argument comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSource {
    /// The whole JSON body.
    Body,
    /// First value of a query key, as a string.
    Query(String),
    /// Every value of a repeated query key, as an array of strings.
    Queries(String),
    /// A path parameter, as a string.
    Param(String),
}

impl ArgSource {
    pub fn query(name: impl Into<String>) -> Self {
        Self::Query(name.into())
    }

    pub fn queries(name: impl Into<String>) -> Self {
        Self::Queries(name.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }
}

/// The request parts arguments are bound from.
#[derive(Debug, Clone, Default)]
pub struct ArgInputs {
    pub body: Option<Value>,
    /// Query pairs in request order; keys may repeat.
    pub query: Vec<(String, String)>,
    pub path: HashMap<String, String>,
}

/// Lay out one argument per source, in order. A source with nothing to
/// bind yields `None`, leaving that position absent. Values are never
/// coerced: query and path values stay strings.
pub fn bind_args(sources: &[ArgSource], inputs: &ArgInputs) -> Vec<Option<Value>> {
    sources
        .iter()
        .map(|source| match source {
            ArgSource::Body => inputs.body.clone(),
            ArgSource::Query(name) => inputs
                .query
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| Value::String(value.clone())),
            ArgSource::Queries(name) => {
                let values: Vec<Value> = inputs
                    .query
                    .iter()
                    .filter(|(key, _)| key == name)
                    .map(|(_, value)| Value::String(value.clone()))
                    .collect();
                (!values.is_empty()).then_some(Value::Array(values))
            }
            ArgSource::Param(name) => inputs.path.get(name).cloned().map(Value::String),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_schema::{Constrain, Field, SchemaRegistry};
    use serde_json::json;

    fn inputs() -> ArgInputs {
        ArgInputs {
            body: Some(json!({"name": "Al"})),
            query: vec![
                ("tag".to_string(), "a".to_string()),
                ("keyword".to_string(), "rust".to_string()),
                ("tag".to_string(), "b".to_string()),
            ],
            path: HashMap::from([("category".to_string(), "books".to_string())]),
        }
    }

    #[test]
    fn binds_each_source_in_order() {
        let args = bind_args(
            &[
                ArgSource::param("category"),
                ArgSource::query("keyword"),
                ArgSource::queries("tag"),
                ArgSource::Body,
            ],
            &inputs(),
        );
        assert_eq!(
            args,
            vec![
                Some(json!("books")),
                Some(json!("rust")),
                Some(json!(["a", "b"])),
                Some(json!({"name": "Al"})),
            ]
        );
    }

    #[test]
    fn missing_sources_stay_absent() {
        let args = bind_args(
            &[
                ArgSource::query("page"),
                ArgSource::queries("sort"),
                ArgSource::param("id"),
                ArgSource::Body,
            ],
            &ArgInputs::default(),
        );
        assert_eq!(args, vec![None, None, None, None]);
    }

    #[test]
    fn first_query_value_wins() {
        let args = bind_args(&[ArgSource::query("tag")], &inputs());
        assert_eq!(args, vec![Some(json!("a"))]);
    }

    #[test]
    fn validated_json_applies_transforms() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Note");
        registry
            .declare_prop(class, Field::of::<String>("title").trim())
            .unwrap();
        let validator = registry.finalize_object_schema(class).unwrap().unwrap();

        let value =
            extract_validated_json(Ok(Json(json!({"title": "  hi "}))), &validator).unwrap();
        assert_eq!(value, json!({"title": "hi"}));

        let err = extract_validated_json(Ok(Json(json!({}))), &validator).unwrap_err();
        match err {
            ApiError::Validation(failure) => assert_eq!(failure.errors[0].field, "title"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
