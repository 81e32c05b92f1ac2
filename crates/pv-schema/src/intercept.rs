//! # Validation Interceptor
//!
//! Wraps a method so every call validates its declared arguments first.
//!
//! Per call:
//!
//! 1. **Materialize** a named record from the positional arguments using
//!    the argument-name map. Undeclared positions stay out of it.
//! 2. **Validate** the record. Defaults and transforms are applied to it.
//! 3. **Branch.** On failure the error policy decides the result. On
//!    success the positional list is rebuilt with each declared position
//!    taken from the record, and the target runs with it.
//!
//! Wrapping compiles the method schema when no validator matches the
//! schema the class currently sees, including an ancestor's validator
//! left behind by subclass declarations. A method without a schema or
//! argument-name map is wrapped as a plain pass-through; that is
//! reported once, when wrapping.

use std::fmt;
use std::sync::Arc;

use pv_core::{ClassId, ValidationFailure};
use serde_json::{Map, Value};
use tracing::debug;

use crate::engine::CompiledValidator;
use crate::registry::{ArgumentNames, DiagnosticKind, SchemaRegistry};

/// Reaction to a failed validation. Its result becomes the call's result.
pub type ErrorPolicy<T, E> = Arc<dyn Fn(ValidationFailure) -> Result<T, E> + Send + Sync>;

type Invocation<T, E> = Box<dyn Fn(Vec<Value>) -> Result<T, E> + Send + Sync>;

#[derive(Debug, Clone)]
struct CallPlan {
    validator: Arc<CompiledValidator>,
    names: ArgumentNames,
}

/// A method wrapped with argument validation.
pub struct Intercepted<T, E> {
    label: String,
    plan: Option<CallPlan>,
    on_error: ErrorPolicy<T, E>,
    target: Invocation<T, E>,
}

impl<T, E> fmt::Debug for Intercepted<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercepted")
            .field("label", &self.label)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl SchemaRegistry {
    /// Wrap `target`, the implementation of `class::method`.
    ///
    /// A method with a declared schema that was never finalized is
    /// finalized here. The default error policy returns the failure
    /// converted into `E`.
    pub fn intercept<T, E, F>(&mut self, class: ClassId, method: &str, target: F) -> Intercepted<T, E>
    where
        F: Fn(Vec<Value>) -> Result<T, E> + Send + Sync + 'static,
        E: From<ValidationFailure> + 'static,
        T: 'static,
    {
        let label = format!("{}#{method}", self.class_name(class));
        let names = self.argument_names(class, method).cloned();
        let mut validator = self
            .method_validator(class, method)
            .filter(|v| self.is_current(class, method, v));

        let mut reported = false;
        if validator.is_none() && names.is_some() && self.method_schema(class, method).is_some() {
            // finalize reports its own compile failures
            validator = self.finalize_method_schema(class, method).unwrap_or_default();
            reported = validator.is_none();
        }

        let plan = match (validator, names) {
            (Some(validator), Some(names)) => Some(CallPlan { validator, names }),
            _ => {
                if !reported {
                    self.report(
                        DiagnosticKind::MissingSchema,
                        label.clone(),
                        format!("no schema found for {label}"),
                    );
                }
                None
            }
        };

        Intercepted {
            label,
            plan,
            on_error: Arc::new(reject::<T, E>),
            target: Box::new(target),
        }
    }

    /// Whether `validator` was compiled from the schema `class` sees for
    /// `method` now. An ancestor's validator goes stale once the class
    /// declares arguments of its own.
    fn is_current(&self, class: ClassId, method: &str, validator: &CompiledValidator) -> bool {
        match self.render_method_schema(class, method) {
            Ok(rendered) => {
                rendered.value == *validator.schema() && rendered.messages == validator.messages()
            }
            Err(_) => false,
        }
    }
}

impl<T, E> Intercepted<T, E> {
    /// Replace the default error policy.
    pub fn with_error_policy<P>(mut self, policy: P) -> Self
    where
        P: Fn(ValidationFailure) -> Result<T, E> + Send + Sync + 'static,
    {
        self.on_error = Arc::new(policy);
        self
    }

    /// `Class#method` of the wrapped target.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether calls are validated, as opposed to passed straight through.
    pub fn is_validating(&self) -> bool {
        self.plan.is_some()
    }

    /// Invoke the wrapped method with positional `args`.
    pub fn call(&self, args: Vec<Value>) -> Result<T, E> {
        self.call_sparse(args.into_iter().map(Some).collect())
    }

    /// Invoke with positions that may be absent. An absent position stays
    /// out of the validated record, so its default applies; the target
    /// sees it as `null` unless validation supplied a value.
    pub fn call_sparse(&self, mut args: Vec<Option<Value>>) -> Result<T, E> {
        while matches!(args.last(), Some(None)) {
            args.pop();
        }
        let Some(plan) = &self.plan else {
            return (self.target)(present(args));
        };

        let mut record = Map::new();
        for (position, name) in plan.names.iter() {
            if let Some(Some(value)) = args.get(position) {
                record.insert(name.to_string(), value.clone());
            }
        }
        let mut record = Value::Object(record);

        if let Err(failure) = plan.validator.check(&mut record) {
            debug!(method = %self.label, errors = failure.errors.len(), "rejected call");
            return (self.on_error)(failure);
        }

        let args = present(args);
        let args = match record {
            Value::Object(record) => reconstruct(args, &plan.names, record),
            _ => args,
        };
        (self.target)(args)
    }
}

fn present(args: Vec<Option<Value>>) -> Vec<Value> {
    args.into_iter().map(Option::unwrap_or_default).collect()
}

fn reject<T, E: From<ValidationFailure>>(failure: ValidationFailure) -> Result<T, E> {
    Err(E::from(failure))
}

/// Substitute validated values into `args`, extending it to cover every
/// declared position the record holds a value for.
fn reconstruct(mut args: Vec<Value>, names: &ArgumentNames, mut record: Map<String, Value>) -> Vec<Value> {
    let needed = names
        .iter()
        .filter(|(_, name)| record.contains_key(*name))
        .map(|(position, _)| position + 1)
        .max()
        .unwrap_or(0);
    if args.len() < needed {
        args.resize(needed, Value::Null);
    }
    for (position, name) in names.iter() {
        if let Some(value) = record.remove(name) {
            args[position] = value;
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Constrain, Param};
    use pv_core::FieldError;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    enum CallError {
        Invalid(ValidationFailure),
    }

    impl From<ValidationFailure> for CallError {
        fn from(failure: ValidationFailure) -> Self {
            Self::Invalid(failure)
        }
    }

    fn echo(args: Vec<Value>) -> Result<Vec<Value>, CallError> {
        Ok(args)
    }

    fn search(registry: &mut SchemaRegistry) -> ClassId {
        let class = registry.register_class("Search");
        registry
            .declare_arg(class, "find", Param::of::<String>(0).named("keyword").trim())
            .unwrap();
        registry
            .declare_arg(
                class,
                "find",
                Param::of::<u32>(2).named("limit").nullable().default_value(10),
            )
            .unwrap();
        class
    }

    #[test]
    fn undeclared_positions_pass_through() {
        let mut registry = SchemaRegistry::new();
        let class = search(&mut registry);
        let find = registry.intercept(class, "find", echo);
        assert!(find.is_validating());

        let args = find
            .call(vec![json!("  rust "), json!({"opaque": true})])
            .unwrap();
        assert_eq!(args, vec![json!("rust"), json!({"opaque": true}), json!(10)]);
    }

    #[test]
    fn failure_goes_through_default_policy() {
        let mut registry = SchemaRegistry::new();
        let class = search(&mut registry);
        let find = registry.intercept(class, "find", echo);

        let err = find.call(vec![]).unwrap_err();
        assert_eq!(
            err,
            CallError::Invalid(ValidationFailure::new(vec![FieldError::new("keyword", "required")]))
        );
    }

    #[test]
    fn custom_policy_result_becomes_call_result() {
        let mut registry = SchemaRegistry::new();
        let class = search(&mut registry);
        let find = registry
            .intercept(class, "find", echo)
            .with_error_policy(|failure| Ok(vec![json!(failure.errors.len())]));

        assert_eq!(find.call(vec![json!(5)]).unwrap(), vec![json!(1)]);
    }

    #[test]
    fn missing_schema_wraps_as_pass_through() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Plain");
        let run = registry.intercept(class, "run", echo);
        assert!(!run.is_validating());
        assert_eq!(run.call(vec![json!(1)]).unwrap(), vec![json!(1)]);

        let diagnostics = registry.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "no schema found for Plain#run");
    }

    #[test]
    fn absent_positions_take_defaults() {
        let mut registry = SchemaRegistry::new();
        let class = search(&mut registry);
        let find = registry.intercept(class, "find", echo);

        let args = find
            .call_sparse(vec![Some(json!("go")), None, None])
            .unwrap();
        assert_eq!(args, vec![json!("go"), Value::Null, json!(10)]);
    }

    #[test]
    fn reconstruct_fills_gaps_with_null() {
        let mut names = ArgumentNames::new();
        names.set(0, "a");
        names.set(3, "d");
        let mut record = Map::new();
        record.insert("a".into(), json!(1));
        record.insert("d".into(), json!(4));
        let args = reconstruct(vec![json!(0)], &names, record);
        assert_eq!(args, vec![json!(1), Value::Null, Value::Null, json!(4)]);
    }
}
