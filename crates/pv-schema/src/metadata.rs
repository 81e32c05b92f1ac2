//! # Metadata Store
//!
//! Typed key/value storage scoped to a registered class, with
//! inheritance-aware lookup.
//!
//! Classes live in an arena of [`ClassNode`]s; each node records its
//! parent and its own metadata slots. Keys are zero-sized marker types
//! implementing [`MetadataKey`], so every slot has a statically known
//! value type.
//!
//! ## Copy-on-first-write
//!
//! [`MetadataStore::get_or_init`] is the fork-or-get primitive: it returns
//! the class's own value for a key, first seeding it with a deep copy of
//! the nearest ancestor's value (or a supplied empty value) when the class
//! has none. Mutating the returned value never touches the ancestor.

use std::collections::BTreeMap;
use std::sync::Arc;

use pv_core::{ClassId, ConfigError, Schema};
use tracing::debug;

use crate::engine::CompiledValidator;
use crate::registry::ArgumentNames;

/// A typed metadata slot.
pub trait MetadataKey {
    type Value: Clone;

    /// Stable identifier used in log output.
    const NAME: &'static str;

    fn slot(meta: &ClassMetadata) -> &Option<Self::Value>;

    fn slot_mut(meta: &mut ClassMetadata) -> &mut Option<Self::Value>;
}

/// Per-class metadata slots.
#[derive(Debug, Clone, Default)]
pub struct ClassMetadata {
    object_schema: Option<Schema>,
    method_schemas: Option<BTreeMap<String, Schema>>,
    method_arguments: Option<BTreeMap<String, ArgumentNames>>,
    method_signatures: Option<BTreeMap<String, Vec<String>>>,
    object_validator: Option<Arc<CompiledValidator>>,
    method_validators: Option<BTreeMap<String, Arc<CompiledValidator>>>,
}

macro_rules! metadata_key {
    ($(#[$doc:meta])* $key:ident, $field:ident, $value:ty, $name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $key;

        impl MetadataKey for $key {
            type Value = $value;
            const NAME: &'static str = $name;

            fn slot(meta: &ClassMetadata) -> &Option<$value> {
                &meta.$field
            }

            fn slot_mut(meta: &mut ClassMetadata) -> &mut Option<$value> {
                &mut meta.$field
            }
        }
    };
}

metadata_key!(
    /// The class's Object Schema.
    ObjectSchemaKey,
    object_schema,
    Schema,
    "validation#schema#object"
);
metadata_key!(
    /// Method Schemas keyed by method name.
    MethodSchemasKey,
    method_schemas,
    BTreeMap<String, Schema>,
    "validation#schema#method"
);
metadata_key!(
    /// Argument-Name maps keyed by method name.
    MethodArgumentsKey,
    method_arguments,
    BTreeMap<String, ArgumentNames>,
    "validation#schema#method#argument"
);
metadata_key!(
    /// Parameter names extracted from method signatures.
    MethodSignaturesKey,
    method_signatures,
    BTreeMap<String, Vec<String>>,
    "validation#signature#method"
);
metadata_key!(
    /// Compiled validator for the class's own shape.
    ObjectValidatorKey,
    object_validator,
    Arc<CompiledValidator>,
    "validation#schema#object#validate"
);
metadata_key!(
    /// Compiled validators keyed by method name.
    MethodValidatorsKey,
    method_validators,
    BTreeMap<String, Arc<CompiledValidator>>,
    "validation#schema#method#validate"
);

/// A registered class.
#[derive(Debug, Clone)]
pub struct ClassNode {
    name: String,
    parent: Option<ClassId>,
    metadata: ClassMetadata,
}

/// Arena of registered classes and their metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    classes: Vec<ClassNode>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, optionally inheriting from `parent`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownClass` if `parent` was not issued by
    /// this store.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        parent: Option<ClassId>,
    ) -> Result<ClassId, ConfigError> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        Ok(self.push(name.into(), parent))
    }

    /// Register a class without a parent.
    pub fn register_root(&mut self, name: impl Into<String>) -> ClassId {
        self.push(name.into(), None)
    }

    /// Ids are arena indices. A store holds at most `u32::MAX` classes;
    /// registering past that bound panics instead of reusing an id.
    fn push(&mut self, name: String, parent: Option<ClassId>) -> ClassId {
        let index = u32::try_from(self.classes.len());
        let Ok(index) = index else {
            panic!("class arena exceeded u32::MAX entries");
        };
        let id = ClassId(index);
        self.classes.push(ClassNode {
            name,
            parent,
            metadata: ClassMetadata::default(),
        });
        id
    }

    pub fn contains(&self, class: ClassId) -> bool {
        class.index() < self.classes.len()
    }

    /// Class name, or `"<unknown>"` for a foreign handle.
    pub fn name(&self, class: ClassId) -> &str {
        self.classes
            .get(class.index())
            .map(|n| n.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn parent(&self, class: ClassId) -> Option<ClassId> {
        self.classes.get(class.index()).and_then(|n| n.parent)
    }

    /// The class itself followed by its ancestors, nearest first.
    pub fn lineage(&self, class: ClassId) -> Lineage<'_> {
        Lineage {
            store: self,
            next: Some(class),
        }
    }

    /// Attach or overwrite the class's own value for `K`.
    pub fn define<K: MetadataKey>(
        &mut self,
        class: ClassId,
        value: K::Value,
    ) -> Result<(), ConfigError> {
        *K::slot_mut(&mut self.node_mut(class)?.metadata) = Some(value);
        Ok(())
    }

    pub fn has_own<K: MetadataKey>(&self, class: ClassId) -> bool {
        self.get_own::<K>(class).is_some()
    }

    pub fn has<K: MetadataKey>(&self, class: ClassId) -> bool {
        self.get::<K>(class).is_some()
    }

    /// Class-local lookup, no inheritance walk.
    pub fn get_own<K: MetadataKey>(&self, class: ClassId) -> Option<&K::Value> {
        self.classes
            .get(class.index())
            .and_then(|n| K::slot(&n.metadata).as_ref())
    }

    pub fn get_own_mut<K: MetadataKey>(&mut self, class: ClassId) -> Option<&mut K::Value> {
        self.classes
            .get_mut(class.index())
            .and_then(|n| K::slot_mut(&mut n.metadata).as_mut())
    }

    /// Nearest defined value walking up the inheritance chain.
    pub fn get<K: MetadataKey>(&self, class: ClassId) -> Option<&K::Value> {
        self.lineage(class).find_map(|c| self.get_own::<K>(c))
    }

    /// Fork-or-get: the class's own value for `K`, seeded from the nearest
    /// ancestor (deep copy) or from `empty` when the class has none yet.
    pub fn get_or_init<K: MetadataKey>(
        &mut self,
        class: ClassId,
        empty: impl FnOnce() -> K::Value,
    ) -> Result<&mut K::Value, ConfigError> {
        let inherited = if self.has_own::<K>(class) {
            None
        } else {
            let value = self.get::<K>(class).cloned();
            debug!(
                key = K::NAME,
                class = self.name(class),
                forked = value.is_some(),
                "initializing own metadata"
            );
            value
        };
        let slot = K::slot_mut(&mut self.node_mut(class)?.metadata);
        Ok(slot.get_or_insert_with(move || inherited.unwrap_or_else(empty)))
    }

    fn node(&self, class: ClassId) -> Result<&ClassNode, ConfigError> {
        self.classes
            .get(class.index())
            .ok_or(ConfigError::UnknownClass(class))
    }

    fn node_mut(&mut self, class: ClassId) -> Result<&mut ClassNode, ConfigError> {
        self.classes
            .get_mut(class.index())
            .ok_or(ConfigError::UnknownClass(class))
    }
}

/// Iterator over a class and its ancestors.
pub struct Lineage<'a> {
    store: &'a MetadataStore,
    next: Option<ClassId>,
}

impl Iterator for Lineage<'_> {
    type Item = ClassId;

    fn next(&mut self) -> Option<ClassId> {
        let current = self.next?;
        let node = self.store.classes.get(current.index())?;
        self.next = node.parent;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::SchemaType;

    fn schema_with(name: &str) -> Schema {
        let mut schema = Schema::object();
        schema.set_property(name, Schema::of_type(SchemaType::String));
        schema.require(name);
        schema
    }

    #[test]
    fn ids_are_sequential_arena_indices() {
        let mut store = MetadataStore::new();
        let a = store.register_root("A");
        let b = store.register("B", Some(a)).unwrap();
        assert_eq!(a, ClassId(0));
        assert_eq!(b, ClassId(1));
        assert_eq!(store.parent(b), Some(a));
    }

    #[test]
    fn register_rejects_foreign_parent() {
        let mut store = MetadataStore::new();
        let err = store.register("Orphan", Some(ClassId(9))).unwrap_err();
        assert_eq!(err, ConfigError::UnknownClass(ClassId(9)));
    }

    #[test]
    fn lineage_walks_to_root() {
        let mut store = MetadataStore::new();
        let a = store.register("A", None).unwrap();
        let b = store.register("B", Some(a)).unwrap();
        let c = store.register("C", Some(b)).unwrap();
        assert_eq!(store.lineage(c).collect::<Vec<_>>(), vec![c, b, a]);
    }

    #[test]
    fn get_walks_inheritance_but_get_own_does_not() {
        let mut store = MetadataStore::new();
        let a = store.register("A", None).unwrap();
        let b = store.register("B", Some(a)).unwrap();
        store.define::<ObjectSchemaKey>(a, schema_with("name")).unwrap();

        assert!(store.get_own::<ObjectSchemaKey>(b).is_none());
        assert!(!store.has_own::<ObjectSchemaKey>(b));
        assert!(store.has::<ObjectSchemaKey>(b));
        assert!(store.get::<ObjectSchemaKey>(b).unwrap().property("name").is_some());
    }

    #[test]
    fn get_or_init_forks_a_deep_copy() {
        let mut store = MetadataStore::new();
        let a = store.register("A", None).unwrap();
        let b = store.register("B", Some(a)).unwrap();
        store.define::<ObjectSchemaKey>(a, schema_with("name")).unwrap();

        let own = store.get_or_init::<ObjectSchemaKey>(b, Schema::object).unwrap();
        own.set_property("extra", Schema::of_type(SchemaType::Number));

        let parent = store.get_own::<ObjectSchemaKey>(a).unwrap();
        assert!(parent.property("extra").is_none());
        let child = store.get_own::<ObjectSchemaKey>(b).unwrap();
        assert!(child.property("name").is_some());
        assert!(child.property("extra").is_some());
    }

    #[test]
    fn get_or_init_uses_empty_without_ancestor() {
        let mut store = MetadataStore::new();
        let a = store.register("A", None).unwrap();
        let map = store
            .get_or_init::<MethodSchemasKey>(a, BTreeMap::new)
            .unwrap();
        assert!(map.is_empty());
        assert!(store.has_own::<MethodSchemasKey>(a));
    }

    #[test]
    fn get_or_init_returns_existing_value() {
        let mut store = MetadataStore::new();
        let a = store.register("A", None).unwrap();
        store.define::<ObjectSchemaKey>(a, schema_with("id")).unwrap();
        let own = store.get_or_init::<ObjectSchemaKey>(a, Schema::object).unwrap();
        assert!(own.property("id").is_some());
    }

    #[test]
    fn unknown_class_lookups_are_empty() {
        let store = MetadataStore::new();
        assert!(store.get::<ObjectSchemaKey>(ClassId(0)).is_none());
        assert_eq!(store.name(ClassId(0)), "<unknown>");
        assert_eq!(store.lineage(ClassId(0)).count(), 0);
    }
}
