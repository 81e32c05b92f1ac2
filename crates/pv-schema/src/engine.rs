//! # Validator Engine
//!
//! Adapter over the `jsonschema` crate. A [`CompiledValidator`] owns the
//! rendered JSON schema, the engine's compiled form of it, and the custom
//! error messages collected while rendering.
//!
//! Validation runs in two phases over a mutable instance:
//!
//! 1. **Effects.** The instance is walked alongside the schema. Absent
//!    properties with a declared `default` are filled in, and declared
//!    string transforms run in declaration order. Both happen before any
//!    constraint is checked.
//! 2. **Checks.** The engine evaluates the schema and every violation is
//!    turned into a [`RawFailure`].
//!
//! On failure the instance may already carry effects; callers discard it.

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use pv_core::{Transform, ValidationFailure};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::EngineOptions;
use crate::message;

/// Failure to turn a schema into a compiled validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A class reference leads back to a class already being rendered.
    #[error("cyclic class reference {path}")]
    CyclicReference {
        /// Class whose reference closes the cycle.
        class: String,
        /// The chain of classes, outermost first.
        path: String,
    },

    /// A class reference points to a class with no Object Schema.
    #[error("class {class} has no object schema")]
    MissingClassSchema {
        /// Referenced class.
        class: String,
    },

    /// The engine rejected the rendered schema.
    #[error("validator engine rejected schema: {reason}")]
    Engine {
        /// Engine error message.
        reason: String,
    },
}

/// The violated constraint family of a raw failure, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    Required { property: String },
    Enum { allowed: Value },
    Const { expected: Value },
    MaxLength { limit: Value },
    MinLength { limit: Value },
    Maximum { limit: Value },
    Minimum { limit: Value },
    ExclusiveMaximum { limit: Value },
    ExclusiveMinimum { limit: Value },
    MultipleOf { multiple_of: Value },
    Pattern { pattern: String },
    MaxItems { limit: Value },
    MinItems { limit: Value },
    /// Replaced by a declared per-property message.
    Custom,
    /// Any other keyword; the engine's own message is kept.
    Other { keyword: String },
}

impl FailureKind {
    pub fn keyword(&self) -> &str {
        match self {
            Self::Required { .. } => "required",
            Self::Enum { .. } => "enum",
            Self::Const { .. } => "const",
            Self::MaxLength { .. } => "maxLength",
            Self::MinLength { .. } => "minLength",
            Self::Maximum { .. } => "maximum",
            Self::Minimum { .. } => "minimum",
            Self::ExclusiveMaximum { .. } => "exclusiveMaximum",
            Self::ExclusiveMinimum { .. } => "exclusiveMinimum",
            Self::MultipleOf { .. } => "multipleOf",
            Self::Pattern { .. } => "pattern",
            Self::MaxItems { .. } => "maxItems",
            Self::MinItems { .. } => "minItems",
            Self::Custom => "errorMessage",
            Self::Other { keyword } => keyword,
        }
    }
}

/// One violation as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFailure {
    pub kind: FailureKind,
    /// JSON pointer of the offending value (`""` for the root).
    pub instance_path: String,
    /// Engine message, or the custom message for [`FailureKind::Custom`].
    pub message: String,
}

impl RawFailure {
    /// Pointer of the value the failure is about. For `required` this is
    /// the missing property rather than its parent.
    pub fn subject_path(&self) -> String {
        match &self.kind {
            FailureKind::Required { property } => {
                format!("{}/{}", self.instance_path, escape_pointer(property))
            }
            _ => self.instance_path.clone(),
        }
    }

    fn from_engine(error: &ValidationError<'_>) -> Self {
        let kind = match &error.kind {
            ValidationErrorKind::Required { property, .. } => {
                let property = param(property);
                FailureKind::Required {
                    property: property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string()),
                }
            }
            ValidationErrorKind::Enum { options, .. } => FailureKind::Enum {
                allowed: param(options),
            },
            ValidationErrorKind::Constant { expected_value, .. } => FailureKind::Const {
                expected: param(expected_value),
            },
            ValidationErrorKind::MaxLength { limit, .. } => FailureKind::MaxLength {
                limit: param(limit),
            },
            ValidationErrorKind::MinLength { limit, .. } => FailureKind::MinLength {
                limit: param(limit),
            },
            ValidationErrorKind::Maximum { limit, .. } => FailureKind::Maximum {
                limit: param(limit),
            },
            ValidationErrorKind::Minimum { limit, .. } => FailureKind::Minimum {
                limit: param(limit),
            },
            ValidationErrorKind::ExclusiveMaximum { limit, .. } => FailureKind::ExclusiveMaximum {
                limit: param(limit),
            },
            ValidationErrorKind::ExclusiveMinimum { limit, .. } => FailureKind::ExclusiveMinimum {
                limit: param(limit),
            },
            ValidationErrorKind::MultipleOf { multiple_of, .. } => FailureKind::MultipleOf {
                multiple_of: param(multiple_of),
            },
            ValidationErrorKind::Pattern { pattern, .. } => FailureKind::Pattern {
                pattern: pattern.to_string(),
            },
            ValidationErrorKind::MaxItems { limit, .. } => FailureKind::MaxItems {
                limit: param(limit),
            },
            ValidationErrorKind::MinItems { limit, .. } => FailureKind::MinItems {
                limit: param(limit),
            },
            _ => FailureKind::Other {
                keyword: last_segment(&error.schema_path.to_string()),
            },
        };
        Self {
            kind,
            instance_path: error.instance_path.to_string(),
            message: error.to_string(),
        }
    }
}

fn param(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn last_segment(pointer: &str) -> String {
    pointer.rsplit('/').next().unwrap_or(pointer).to_string()
}

pub(crate) fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// An executable validator. Immutable once built and safe to share.
pub struct CompiledValidator {
    schema: Value,
    messages: Vec<(String, String)>,
    options: EngineOptions,
    validator: Validator,
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledValidator")
            .field("schema", &self.schema)
            .field("messages", &self.messages)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CompiledValidator {
    /// Compile a rendered schema.
    ///
    /// `messages` pairs a property pointer with the message that replaces
    /// every failure at or below it.
    pub fn compile(
        schema: Value,
        messages: Vec<(String, String)>,
        options: EngineOptions,
    ) -> Result<Self, CompileError> {
        let validator = options
            .validation_options()
            .build(&schema)
            .map_err(|e| CompileError::Engine {
                reason: e.to_string(),
            })?;
        Ok(Self {
            schema,
            messages,
            options,
            validator,
        })
    }

    /// The rendered schema this validator was built from.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Custom message pointers, as passed to [`CompiledValidator::compile`].
    pub fn messages(&self) -> &[(String, String)] {
        &self.messages
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Apply effects to `instance`, then check it.
    pub fn validate(&self, instance: &mut Value) -> Result<(), Vec<RawFailure>> {
        apply_effects(&self.schema, instance, self.options.use_defaults);

        let raw: Vec<RawFailure> = self
            .validator
            .iter_errors(instance)
            .map(|e| RawFailure::from_engine(&e))
            .collect();
        if raw.is_empty() {
            return Ok(());
        }

        let mut failures = self.apply_messages(raw);
        if !self.options.all_errors {
            failures.truncate(1);
        }
        Err(failures)
    }

    /// [`CompiledValidator::validate`] with failures translated into the
    /// caller-facing shape.
    pub fn check(&self, instance: &mut Value) -> Result<(), ValidationFailure> {
        self.validate(instance)
            .map_err(|raw| ValidationFailure::new(message::convert_errors(&raw)))
    }

    fn apply_messages(&self, raw: Vec<RawFailure>) -> Vec<RawFailure> {
        if self.messages.is_empty() {
            return raw;
        }
        let mut out: Vec<RawFailure> = Vec::with_capacity(raw.len());
        for failure in raw {
            let subject = failure.subject_path();
            let custom = self
                .messages
                .iter()
                .filter(|(pointer, _)| is_within(&subject, pointer))
                .max_by_key(|(pointer, _)| pointer.len());
            match custom {
                Some((pointer, message)) => {
                    let seen = out.iter().any(|f| {
                        f.kind == FailureKind::Custom && f.instance_path == *pointer
                    });
                    if !seen {
                        out.push(RawFailure {
                            kind: FailureKind::Custom,
                            instance_path: pointer.clone(),
                            message: message.clone(),
                        });
                    }
                }
                None => out.push(failure),
            }
        }
        out
    }
}

fn is_within(path: &str, pointer: &str) -> bool {
    path == pointer
        || path
            .strip_prefix(pointer)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Fill defaults and run transforms, following `schema` into properties
/// and array items. `anyOf` branches are not entered.
pub(crate) fn apply_effects(schema: &Value, instance: &mut Value, use_defaults: bool) {
    if let Value::String(text) = instance {
        if let Some(transforms) = schema.get("transform").and_then(Value::as_array) {
            for raw in transforms {
                if let Ok(transform) = Transform::deserialize(raw) {
                    *text = transform.apply(text);
                }
            }
        }
        return;
    }

    match instance {
        Value::Object(map) => {
            let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                return;
            };
            for (name, property) in properties {
                if use_defaults && !map.contains_key(name) {
                    if let Some(default) = property.get("default") {
                        map.insert(name.clone(), default.clone());
                    }
                }
                if let Some(value) = map.get_mut(name) {
                    apply_effects(property, value, use_defaults);
                }
            }
        }
        Value::Array(elements) => {
            let tuple = schema
                .get("prefixItems")
                .or_else(|| schema.get("items"))
                .and_then(Value::as_array);
            match tuple {
                Some(positions) => {
                    for (element, item) in elements.iter_mut().zip(positions) {
                        apply_effects(item, element, use_defaults);
                    }
                }
                None => {
                    if let Some(item) = schema.get("items").filter(|i| i.is_object()) {
                        for element in elements.iter_mut() {
                            apply_effects(item, element, use_defaults);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}
