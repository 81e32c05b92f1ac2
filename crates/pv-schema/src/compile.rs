//! # Schema Compiler
//!
//! Renders finished schemas to JSON and compiles them into validators
//! stored on the owning class.
//!
//! ## Rendering
//!
//! - Class references are inlined from the referenced class's Object
//!   Schema at render time. A reference back into a class already on the
//!   render path is a [`CompileError::CyclicReference`].
//! - `nullable` becomes `"null"` in `type` (and in `enum` when present).
//! - Tuples render as `items: [...]` for draft 7 and `prefixItems` for
//!   2020-12.
//! - Per-property error messages are lifted out of the schema into the
//!   validator, keyed by the property's instance pointer. Messages inside
//!   array items are not collected.
//!
//! ## Finalize
//!
//! Missing schemas and compile failures are diagnostics, never errors:
//! the target simply stays unvalidated.

use std::sync::Arc;

use pv_core::{ClassId, ConfigError, Items, Schema, SchemaType, TypeSpec, ValidationFailure};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Draft;
use crate::engine::{escape_pointer, CompileError, CompiledValidator};
use crate::metadata::{MetadataStore, ObjectSchemaKey};
use crate::registry::{DiagnosticKind, SchemaRegistry};

/// A schema rendered to engine JSON, with its collected messages.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSchema {
    pub value: Value,
    /// `(instance pointer, message)` pairs.
    pub messages: Vec<(String, String)>,
}

struct Renderer<'a> {
    store: &'a MetadataStore,
    draft: Draft,
    stack: Vec<ClassId>,
    messages: Vec<(String, String)>,
}

impl<'a> Renderer<'a> {
    fn new(store: &'a MetadataStore, draft: Draft, root: Option<ClassId>) -> Self {
        Self {
            store,
            draft,
            stack: root.into_iter().collect(),
            messages: Vec::new(),
        }
    }

    fn finish(mut self, schema: &Schema) -> Result<RenderedSchema, CompileError> {
        let value = Value::Object(self.node(schema, Some(""))?);
        Ok(RenderedSchema {
            value,
            messages: self.messages,
        })
    }

    /// `pointer` is the instance pointer of this node when it is reached
    /// through properties only.
    fn node(&mut self, schema: &Schema, pointer: Option<&str>) -> Result<Map<String, Value>, CompileError> {
        let mut out = match schema.schema_type.as_ref().and_then(TypeSpec::as_class) {
            Some(class) => self.class(class, pointer)?,
            None => Map::new(),
        };

        match &schema.schema_type {
            Some(TypeSpec::Single(ty)) => {
                out.insert("type".into(), Value::from(ty.as_str()));
            }
            Some(TypeSpec::Union(types)) => {
                let types = types.iter().map(|t| Value::from(t.as_str())).collect();
                out.insert("type".into(), Value::Array(types));
            }
            Some(TypeSpec::Class(_)) | None => {}
        }

        if let Some(properties) = &schema.properties {
            let mut rendered = Map::new();
            for (name, property) in properties {
                let child = pointer.map(|p| format!("{p}/{}", escape_pointer(name)));
                rendered.insert(name.clone(), Value::Object(self.node(property, child.as_deref())?));
            }
            out.insert("properties".into(), Value::Object(rendered));
        }
        if let Some(required) = &schema.required {
            out.insert("required".into(), Value::from(required.clone()));
        }

        match &schema.items {
            Some(Items::Single(item)) => {
                out.insert("items".into(), Value::Object(self.node(item, None)?));
            }
            // item bounds alone describe the empty tuple
            Some(Items::Tuple(positions)) if positions.is_empty() => {}
            Some(Items::Tuple(positions)) => {
                let rendered = positions
                    .iter()
                    .map(|p| self.node(p, None).map(Value::Object))
                    .collect::<Result<Vec<_>, _>>()?;
                let key = match self.draft {
                    Draft::Draft7 => "items",
                    Draft::Draft202012 => "prefixItems",
                };
                out.insert(key.into(), Value::Array(rendered));
            }
            None => {}
        }
        if let Some(any_of) = &schema.any_of {
            let rendered = any_of
                .iter()
                .map(|s| self.node(s, None).map(Value::Object))
                .collect::<Result<Vec<_>, _>>()?;
            out.insert("anyOf".into(), Value::Array(rendered));
        }

        if let Some(default) = &schema.default {
            out.insert("default".into(), default.clone());
        }
        if let Some(values) = &schema.enumeration {
            out.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(constant) = &schema.constant {
            out.insert("const".into(), constant.clone());
        }
        for (key, bound) in [
            ("maximum", schema.maximum),
            ("minimum", schema.minimum),
            ("exclusiveMaximum", schema.exclusive_maximum),
            ("exclusiveMinimum", schema.exclusive_minimum),
            ("multipleOf", schema.multiple_of),
        ] {
            if let Some(n) = bound {
                out.insert(key.into(), number(n));
            }
        }
        for (key, count) in [
            ("maxLength", schema.max_length),
            ("minLength", schema.min_length),
            ("maxItems", schema.max_items),
            ("minItems", schema.min_items),
        ] {
            if let Some(n) = count {
                out.insert(key.into(), Value::from(n));
            }
        }
        if let Some(pattern) = &schema.pattern {
            out.insert("pattern".into(), Value::from(pattern.clone()));
        }
        if let Some(format) = &schema.format {
            out.insert("format".into(), Value::from(format.clone()));
        }
        if let Some(transforms) = &schema.transform {
            let names = transforms.iter().map(|t| Value::from(t.as_str())).collect();
            out.insert("transform".into(), Value::Array(names));
        }

        if let (Some(messages), Some(pointer)) = (&schema.error_message, pointer) {
            for (name, message) in &messages.properties {
                self.messages
                    .push((format!("{pointer}/{}", escape_pointer(name)), message.clone()));
            }
        }

        if schema.is_nullable() {
            make_nullable(&mut out);
        }
        Ok(out)
    }

    fn class(&mut self, class: ClassId, pointer: Option<&str>) -> Result<Map<String, Value>, CompileError> {
        if self.stack.contains(&class) {
            let path = self
                .stack
                .iter()
                .chain(std::iter::once(&class))
                .map(|c| self.store.name(*c))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(CompileError::CyclicReference {
                class: self.store.name(class).to_string(),
                path,
            });
        }
        let store = self.store;
        let target = store
            .get::<ObjectSchemaKey>(class)
            .ok_or_else(|| CompileError::MissingClassSchema {
                class: store.name(class).to_string(),
            })?;
        self.stack.push(class);
        let rendered = self.node(target, pointer);
        self.stack.pop();
        rendered
    }
}

fn make_nullable(node: &mut Map<String, Value>) {
    let null = Value::from(SchemaType::Null.as_str());
    match node.get_mut("type") {
        Some(Value::Array(types)) => {
            if !types.contains(&null) {
                types.push(null);
            }
        }
        Some(single) => {
            let ty = single.take();
            *single = Value::Array(vec![ty, null]);
        }
        None => {}
    }
    if let Some(Value::Array(values)) = node.get_mut("enum") {
        if !values.contains(&Value::Null) {
            values.push(Value::Null);
        }
    }
}

/// Integral bounds render as JSON integers so messages read `0`, not `0.0`.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Render `schema` as engine JSON. `root` is the class owning the schema,
/// if any, so that self references are detected.
pub fn render_schema(
    store: &MetadataStore,
    schema: &Schema,
    root: Option<ClassId>,
    draft: Draft,
) -> Result<RenderedSchema, CompileError> {
    Renderer::new(store, draft, root).finish(schema)
}

impl SchemaRegistry {
    /// Render the Object Schema that applies to `class` (own or inherited).
    pub fn render_object_schema(&self, class: ClassId) -> Result<RenderedSchema, CompileError> {
        let schema = self
            .effective_object_schema(class)
            .ok_or_else(|| CompileError::MissingClassSchema {
                class: self.class_name(class).to_string(),
            })?;
        render_schema(&self.store, schema, Some(class), self.options.draft)
    }

    pub fn render_method_schema(
        &self,
        class: ClassId,
        method: &str,
    ) -> Result<RenderedSchema, CompileError> {
        let schema = self.method_schema(class, method).ok_or_else(|| {
            CompileError::MissingClassSchema {
                class: format!("{}#{method}", self.class_name(class)),
            }
        })?;
        render_schema(&self.store, schema, None, self.options.draft)
    }

    /// Compile the Object Schema of `class` and store the validator on it.
    ///
    /// Returns `Ok(None)` after reporting a diagnostic when there is no
    /// schema or it does not compile.
    ///
    /// # Errors
    ///
    /// `UnknownClass` for foreign handles.
    pub fn finalize_object_schema(
        &mut self,
        class: ClassId,
    ) -> Result<Option<Arc<CompiledValidator>>, ConfigError> {
        if !self.store.contains(class) {
            return Err(ConfigError::UnknownClass(class));
        }
        let name = self.class_name(class).to_string();
        if self.effective_object_schema(class).is_none() {
            self.report(
                DiagnosticKind::MissingSchema,
                name.clone(),
                format!("no schema found for {name}"),
            );
            return Ok(None);
        }

        let compiled = self
            .render_object_schema(class)
            .and_then(|r| CompiledValidator::compile(r.value, r.messages, self.options));
        match compiled {
            Ok(validator) => {
                let validator = Arc::new(validator);
                self.store_compiled_validator(class, Arc::clone(&validator))?;
                debug!(class = %name, "compiled object schema");
                Ok(Some(validator))
            }
            Err(err) => {
                self.report(
                    DiagnosticKind::CompileFailed,
                    name.clone(),
                    format!("failed to compile validation schema for {name}: {err}"),
                );
                Ok(None)
            }
        }
    }

    /// Compile the Method Schema of `class::method`. Both the schema and
    /// the argument-name map must exist.
    pub fn finalize_method_schema(
        &mut self,
        class: ClassId,
        method: &str,
    ) -> Result<Option<Arc<CompiledValidator>>, ConfigError> {
        if !self.store.contains(class) {
            return Err(ConfigError::UnknownClass(class));
        }
        let label = format!("{}#{method}", self.class_name(class));
        if self.method_schema(class, method).is_none()
            || self.argument_names(class, method).is_none()
        {
            self.report(
                DiagnosticKind::MissingSchema,
                label.clone(),
                format!("no schema found for {label}"),
            );
            return Ok(None);
        }

        let compiled = self
            .render_method_schema(class, method)
            .and_then(|r| CompiledValidator::compile(r.value, r.messages, self.options));
        match compiled {
            Ok(validator) => {
                let validator = Arc::new(validator);
                self.store_compiled_method_validator(class, method, Arc::clone(&validator))?;
                debug!(method = %label, "compiled method schema");
                Ok(Some(validator))
            }
            Err(err) => {
                self.report(
                    DiagnosticKind::CompileFailed,
                    label.clone(),
                    format!("failed to compile validation schema for {label}: {err}"),
                );
                Ok(None)
            }
        }
    }

    /// Validate `value` against the finalized Object Schema of `class`,
    /// returning it with defaults and transforms applied.
    ///
    /// A class without a compiled validator passes every value through.
    pub fn validate_object(&self, class: ClassId, value: Value) -> Result<Value, ValidationFailure> {
        let Some(validator) = self.object_validator(class) else {
            return Ok(value);
        };
        let mut value = value;
        validator.check(&mut value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Constrain, Field};
    use crate::config::EngineOptions;
    use crate::resolve::NativeType;
    use pv_core::ItemShape;
    use serde_json::json;

    #[test]
    fn renders_object_schema() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Person");
        registry.declare_prop(class, Field::of::<String>("name")).unwrap();
        registry
            .declare_prop(class, Field::of::<f64>("age").minimum(0))
            .unwrap();
        let rendered = registry.render_object_schema(class).unwrap();
        assert_eq!(
            rendered.value,
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "number", "minimum": 0}
                },
                "required": ["name", "age"]
            })
        );
    }

    #[test]
    fn nullable_adds_null_to_type_and_enum() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Filter");
        registry
            .declare_prop(class, Field::of::<String>("sort").one_of(["asc", "desc"]).nullable())
            .unwrap();
        let rendered = registry.render_object_schema(class).unwrap();
        assert_eq!(
            rendered.value["properties"]["sort"],
            json!({"type": ["string", "null"], "enum": ["asc", "desc", null]})
        );
    }

    #[test]
    fn class_references_are_inlined() {
        let mut registry = SchemaRegistry::new();
        let address = registry.register_class("Address");
        registry
            .declare_prop(address, Field::of::<String>("city").message("bad city"))
            .unwrap();
        let user = registry.register_class("User");
        registry
            .declare_prop(user, Field::new("home").native(NativeType::Class(address)))
            .unwrap();

        let rendered = registry.render_object_schema(user).unwrap();
        assert_eq!(
            rendered.value["properties"]["home"],
            json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            })
        );
        assert_eq!(rendered.messages, vec![("/home/city".to_string(), "bad city".to_string())]);
    }

    #[test]
    fn self_reference_is_rejected() {
        let mut registry = SchemaRegistry::new();
        let node = registry.register_class("Node");
        registry.declare_prop(node, Field::of::<String>("id")).unwrap();
        registry
            .declare_prop(node, Field::new("next").ty(node).nullable())
            .unwrap();
        let err = registry.render_object_schema(node).unwrap_err();
        assert!(matches!(err, CompileError::CyclicReference { ref path, .. } if path == "Node -> Node"));

        assert!(registry.finalize_object_schema(node).unwrap().is_none());
        assert_eq!(registry.diagnostics()[0].kind, DiagnosticKind::CompileFailed);
        assert!(registry.object_validator(node).is_none());
    }

    #[test]
    fn tuple_key_follows_draft() {
        let mut registry = SchemaRegistry::new().with_options(EngineOptions {
            draft: Draft::Draft202012,
            ..EngineOptions::default()
        });
        let class = registry.register_class("Point");
        registry
            .declare_prop(
                class,
                Field::of::<Vec<f64>>("xy").array_tuple([
                    ItemShape::from(SchemaType::Number),
                    ItemShape::from(SchemaType::Number),
                ]),
            )
            .unwrap();
        let rendered = registry.render_object_schema(class).unwrap();
        let xy = &rendered.value["properties"]["xy"];
        assert_eq!(xy["prefixItems"], json!([{"type": "number"}, {"type": "number"}]));
        assert!(xy.get("items").is_none());
        assert_eq!(xy["minItems"], 2);
    }

    #[test]
    fn finalize_without_schema_reports() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Empty");
        assert!(registry.finalize_object_schema(class).unwrap().is_none());
        assert!(registry.finalize_method_schema(class, "run").unwrap().is_none());
        let messages: Vec<_> = registry.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["no schema found for Empty", "no schema found for Empty#run"]);
    }

    #[test]
    fn finalize_unknown_class_is_an_error() {
        let mut registry = SchemaRegistry::new();
        let err = registry.finalize_object_schema(ClassId(3)).unwrap_err();
        assert_eq!(err, ConfigError::UnknownClass(ClassId(3)));
    }

    #[test]
    fn validate_object_applies_effects() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Tag");
        registry
            .declare_prop(class, Field::of::<String>("label").trim().max_length(3))
            .unwrap();
        registry
            .declare_prop(class, Field::of::<u32>("weight").nullable().default_value(1))
            .unwrap();
        registry.finalize_object_schema(class).unwrap();

        let value = registry.validate_object(class, json!({"label": "  abc  "})).unwrap();
        assert_eq!(value, json!({"label": "abc", "weight": 1}));

        let failure = registry.validate_object(class, json!({"label": "abcd"})).unwrap_err();
        assert_eq!(failure.errors[0].field, "label");
        assert_eq!(failure.errors[0].message, "must have fewer than 3 characters");
    }

    #[test]
    fn unfinalized_class_passes_values_through() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Loose");
        registry.declare_prop(class, Field::of::<String>("name")).unwrap();
        let value = registry.validate_object(class, json!({})).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn integral_bounds_render_as_integers() {
        assert_eq!(number(0.0), json!(0));
        assert_eq!(number(-3.0), json!(-3));
        assert_eq!(number(1.5), json!(1.5));
    }
}
