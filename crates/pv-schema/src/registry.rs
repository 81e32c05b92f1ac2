//! # Schema Registry
//!
//! Owns the per-class and per-method schema fragments, the argument-name
//! maps, and the compiled validators, all held in a [`MetadataStore`].
//!
//! Every `ensure_*` operation is fork-or-get: a class that has never been
//! declared on shares its nearest ancestor's fragment for reads, and gets
//! a deep copy of it on the first write. Mutating a subclass therefore
//! never changes an ancestor's schema or its already-compiled validator.
//!
//! The registry also carries the engine options, the type resolver, and
//! the diagnostic channel that collects declaration-time warnings.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pv_core::{ClassId, ConfigError, Schema};
use tracing::warn;

use crate::config::EngineOptions;
use crate::engine::CompiledValidator;
use crate::metadata::{
    MetadataStore, MethodArgumentsKey, MethodSchemasKey, MethodSignaturesKey,
    MethodValidatorsKey, ObjectSchemaKey, ObjectValidatorKey,
};
use crate::resolve::{DefaultTypeResolver, TypeResolver};
use crate::signature;

/// Zero-based parameter position to logical argument name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentNames(BTreeMap<usize, String>);

impl ArgumentNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the name of `position`, replacing any earlier name.
    pub fn set(&mut self, position: usize, name: impl Into<String>) {
        self.0.insert(position, name.into());
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.0.get(&position).map(String::as_str)
    }

    pub fn contains(&self, position: usize) -> bool {
        self.0.contains_key(&position)
    }

    /// Positions and names in ascending position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(|(p, n)| (*p, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max_position(&self) -> Option<usize> {
        self.0.keys().next_back().copied()
    }
}

/// Category of a declaration-time warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A constraint family was declared on a type that cannot carry it.
    UnsupportedConstraint,
    /// A schema could not be compiled; the target stays unvalidated.
    CompileFailed,
    /// Finalize or intercept found no schema for the target.
    MissingSchema,
}

/// A non-fatal configuration warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// `Class`, `Class#member`, or `Class#method#argument`.
    pub target: String,
    pub message: String,
}

/// Registry of schema fragments, compiled validators and diagnostics.
pub struct SchemaRegistry {
    pub(crate) store: MetadataStore,
    pub(crate) options: EngineOptions,
    pub(crate) resolver: Box<dyn TypeResolver>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("store", &self.store)
            .field("options", &self.options)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl SchemaRegistry {
    /// A registry with default engine options and the default resolver.
    pub fn new() -> Self {
        Self {
            store: MetadataStore::new(),
            options: EngineOptions::default(),
            resolver: Box::new(DefaultTypeResolver),
            diagnostics: Vec::new(),
        }
    }

    /// Install engine options for every schema compiled afterwards.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the type resolver used for declarations without an
    /// explicit type.
    pub fn with_resolver(mut self, resolver: impl TypeResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn register_class(&mut self, name: impl Into<String>) -> ClassId {
        self.store.register_root(name)
    }

    /// Register a class inheriting schemas and validators from `parent`.
    pub fn register_subclass(
        &mut self,
        name: impl Into<String>,
        parent: ClassId,
    ) -> Result<ClassId, ConfigError> {
        self.store.register(name, Some(parent))
    }

    pub fn class_name(&self, class: ClassId) -> &str {
        self.store.name(class)
    }

    // -- Object Schema ----------------------------------------------------

    /// The class's own Object Schema, without inheritance fallback.
    ///
    /// `None` means the class itself was never declared on.
    pub fn object_schema_of(&self, class: ClassId) -> Option<&Schema> {
        self.store.get_own::<ObjectSchemaKey>(class)
    }

    /// The Object Schema that applies to `class`, own or inherited.
    pub fn effective_object_schema(&self, class: ClassId) -> Option<&Schema> {
        self.store.get::<ObjectSchemaKey>(class)
    }

    /// The class's own Object Schema, forked from the nearest ancestor or
    /// created empty.
    pub fn ensure_object_schema(&mut self, class: ClassId) -> Result<&mut Schema, ConfigError> {
        self.store.get_or_init::<ObjectSchemaKey>(class, Schema::object)
    }

    // -- Method Schemas and argument names --------------------------------

    pub fn method_schema(&self, class: ClassId, method: &str) -> Option<&Schema> {
        self.store
            .get::<MethodSchemasKey>(class)
            .and_then(|m| m.get(method))
    }

    pub fn ensure_method_schema(
        &mut self,
        class: ClassId,
        method: &str,
    ) -> Result<&mut Schema, ConfigError> {
        let map = self
            .store
            .get_or_init::<MethodSchemasKey>(class, BTreeMap::new)?;
        Ok(map.entry(method.to_string()).or_insert_with(Schema::object))
    }

    pub fn argument_names(&self, class: ClassId, method: &str) -> Option<&ArgumentNames> {
        self.store
            .get::<MethodArgumentsKey>(class)
            .and_then(|m| m.get(method))
    }

    pub fn ensure_argument_names(
        &mut self,
        class: ClassId,
        method: &str,
    ) -> Result<&mut ArgumentNames, ConfigError> {
        let map = self
            .store
            .get_or_init::<MethodArgumentsKey>(class, BTreeMap::new)?;
        Ok(map.entry(method.to_string()).or_default())
    }

    /// Record the signature text of `method`; its parameter names become
    /// the fallback for arguments declared without a name.
    pub fn register_signature(
        &mut self,
        class: ClassId,
        method: &str,
        source: &str,
    ) -> Result<(), ConfigError> {
        let names = signature::param_names(source);
        self.store
            .get_or_init::<MethodSignaturesKey>(class, BTreeMap::new)?
            .insert(method.to_string(), names);
        Ok(())
    }

    /// Parameter names recorded for `method`, empty if none.
    pub fn signature_names(&self, class: ClassId, method: &str) -> &[String] {
        self.store
            .get::<MethodSignaturesKey>(class)
            .and_then(|m| m.get(method))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // -- Compiled validators ----------------------------------------------

    pub fn store_compiled_validator(
        &mut self,
        class: ClassId,
        validator: Arc<CompiledValidator>,
    ) -> Result<(), ConfigError> {
        self.store.define::<ObjectValidatorKey>(class, validator)
    }

    pub fn store_compiled_method_validator(
        &mut self,
        class: ClassId,
        method: &str,
        validator: Arc<CompiledValidator>,
    ) -> Result<(), ConfigError> {
        self.store
            .get_or_init::<MethodValidatorsKey>(class, BTreeMap::new)?
            .insert(method.to_string(), validator);
        Ok(())
    }

    /// The object validator of `class` or its nearest compiled ancestor.
    pub fn object_validator(&self, class: ClassId) -> Option<Arc<CompiledValidator>> {
        self.store.get::<ObjectValidatorKey>(class).cloned()
    }

    pub fn method_validator(&self, class: ClassId, method: &str) -> Option<Arc<CompiledValidator>> {
        self.store
            .get::<MethodValidatorsKey>(class)
            .and_then(|m| m.get(method))
            .cloned()
    }

    // -- Diagnostics ------------------------------------------------------

    /// Warnings reported so far, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub(crate) fn report(
        &mut self,
        kind: DiagnosticKind,
        target: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            target: target.into(),
            message: message.into(),
        };
        warn!(kind = ?diagnostic.kind, target = %diagnostic.target, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::SchemaType;

    #[test]
    fn argument_names_track_positions() {
        let mut names = ArgumentNames::new();
        names.set(2, "limit");
        names.set(0, "keyword");
        assert_eq!(names.get(0), Some("keyword"));
        assert!(!names.contains(1));
        assert_eq!(names.max_position(), Some(2));
        assert_eq!(names.iter().collect::<Vec<_>>(), vec![(0, "keyword"), (2, "limit")]);
    }

    #[test]
    fn ensure_object_schema_creates_empty_object() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Person");
        assert!(registry.object_schema_of(class).is_none());
        let schema = registry.ensure_object_schema(class).unwrap();
        assert_eq!(*schema, Schema::object());
        assert!(registry.object_schema_of(class).is_some());
    }

    #[test]
    fn subclass_shares_until_first_write() {
        let mut registry = SchemaRegistry::new();
        let base = registry.register_class("Base");
        let derived = registry.register_subclass("Derived", base).unwrap();
        registry
            .ensure_object_schema(base)
            .unwrap()
            .set_property("id", Schema::of_type(SchemaType::String));

        assert!(registry.object_schema_of(derived).is_none());
        assert!(registry.effective_object_schema(derived).unwrap().property("id").is_some());

        registry
            .ensure_object_schema(derived)
            .unwrap()
            .set_property("extra", Schema::of_type(SchemaType::Number));
        assert!(registry.object_schema_of(base).unwrap().property("extra").is_none());
        assert!(registry.object_schema_of(derived).unwrap().property("id").is_some());
    }

    #[test]
    fn method_schemas_are_scoped_by_name() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Service");
        registry
            .ensure_method_schema(class, "find")
            .unwrap()
            .set_property("id", Schema::of_type(SchemaType::String));
        registry.ensure_method_schema(class, "list").unwrap();

        assert!(registry.method_schema(class, "find").unwrap().property("id").is_some());
        assert!(registry.method_schema(class, "list").unwrap().property("id").is_none());
        assert!(registry.method_schema(class, "other").is_none());
    }

    #[test]
    fn argument_names_fork_on_inheritance() {
        let mut registry = SchemaRegistry::new();
        let base = registry.register_class("Base");
        let derived = registry.register_subclass("Derived", base).unwrap();
        registry.ensure_argument_names(base, "find").unwrap().set(0, "id");
        registry.ensure_argument_names(derived, "find").unwrap().set(1, "limit");

        assert_eq!(registry.argument_names(base, "find").unwrap().len(), 1);
        assert_eq!(registry.argument_names(derived, "find").unwrap().len(), 2);
    }

    #[test]
    fn signature_names_default_to_empty() {
        let mut registry = SchemaRegistry::new();
        let class = registry.register_class("Service");
        assert!(registry.signature_names(class, "find").is_empty());
        registry
            .register_signature(class, "find", "fn find(&self, id: String)")
            .unwrap();
        assert_eq!(registry.signature_names(class, "find"), ["id".to_string()]);
    }

    #[test]
    fn unknown_class_is_a_config_error() {
        let mut registry = SchemaRegistry::new();
        let err = registry.ensure_object_schema(ClassId(7)).unwrap_err();
        assert_eq!(err, ConfigError::UnknownClass(ClassId(7)));
    }

    #[test]
    fn diagnostics_accumulate_and_drain() {
        let mut registry = SchemaRegistry::new();
        registry.report(DiagnosticKind::MissingSchema, "Ghost", "no schema found for Ghost");
        assert_eq!(registry.diagnostics().len(), 1);
        let drained = registry.take_diagnostics();
        assert_eq!(drained[0].kind, DiagnosticKind::MissingSchema);
        assert!(registry.diagnostics().is_empty());
    }
}
