//! # Schema Model
//!
//! The canonical description of an object's or value's expected shape.
//!
//! A [`Schema`] is either an object node (named `properties` plus the
//! `required` name list) or a primitive/array node carrying a `type` and
//! optional constraints. Serialization uses JSON Schema keyword names so
//! that a schema can be inspected or logged exactly as the validator
//! engine will see it, apart from class references which are resolved at
//! compile time.
//!
//! ## Invariants
//!
//! - `required` never names a property absent from `properties`:
//!   [`Schema::set_property`] and [`Schema::require`] are the only writers
//!   and `require` refuses unknown names.
//! - A nullable property is never in `required`: [`Schema::mark_nullable`]
//!   removes it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::ClassId;

/// Canonical schema type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Number,
    Integer,
    String,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    /// JSON Schema spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }

    /// Whether this is `number` or `integer`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to another class's Object Schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    #[serde(rename = "$class")]
    pub class: ClassId,
}

/// The `type` of a schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    Single(SchemaType),
    Union(Vec<SchemaType>),
    /// Validate against the referenced class's Object Schema.
    Class(ClassRef),
}

impl TypeSpec {
    pub fn class(class: ClassId) -> Self {
        Self::Class(ClassRef { class })
    }

    /// Whether `ty` is this type or a member of this union.
    pub fn includes(&self, ty: SchemaType) -> bool {
        match self {
            Self::Single(t) => *t == ty,
            Self::Union(ts) => ts.contains(&ty),
            Self::Class(_) => ty == SchemaType::Object,
        }
    }

    /// The referenced class, for class-typed nodes.
    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Self::Class(r) => Some(r.class),
            _ => None,
        }
    }
}

impl From<SchemaType> for TypeSpec {
    fn from(ty: SchemaType) -> Self {
        Self::Single(ty)
    }
}

impl From<Vec<SchemaType>> for TypeSpec {
    fn from(types: Vec<SchemaType>) -> Self {
        Self::Union(types)
    }
}

impl From<ClassId> for TypeSpec {
    fn from(class: ClassId) -> Self {
        Self::class(class)
    }
}

/// String normalization applied before constraint checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transform {
    Trim,
    TrimStart,
    TrimEnd,
    ToLowerCase,
    ToUpperCase,
}

impl Transform {
    pub fn apply(&self, input: &str) -> String {
        match self {
            Self::Trim => input.trim().to_string(),
            Self::TrimStart => input.trim_start().to_string(),
            Self::TrimEnd => input.trim_end().to_string(),
            Self::ToLowerCase => input.to_lowercase(),
            Self::ToUpperCase => input.to_uppercase(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::TrimStart => "trimStart",
            Self::TrimEnd => "trimEnd",
            Self::ToLowerCase => "toLowerCase",
            Self::ToUpperCase => "toUpperCase",
        }
    }
}

/// Array item schema(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    /// Fixed-arity tuple, one schema per position.
    Tuple(Vec<Schema>),
    /// One schema applied to every element.
    Single(Box<Schema>),
}

/// Custom error messages keyed by property name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorMessages {
    pub properties: BTreeMap<String, String>,
}

/// A schema node. See the module docs for invariants.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<TypeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Vec<Transform>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<ErrorMessages>,
}

impl Schema {
    /// An empty object schema: `{type: object, properties: {}, required: []}`.
    pub fn object() -> Self {
        Self {
            schema_type: Some(TypeSpec::Single(SchemaType::Object)),
            properties: Some(BTreeMap::new()),
            required: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// A node carrying only a `type`.
    pub fn of_type(ty: impl Into<TypeSpec>) -> Self {
        Self {
            schema_type: Some(ty.into()),
            ..Self::default()
        }
    }

    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.properties.as_mut().and_then(|p| p.get_mut(name))
    }

    /// Writes (or replaces) the schema of property `name`.
    pub fn set_property(&mut self, name: impl Into<String>, schema: Schema) {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema);
    }

    /// Adds `name` to `required` unless already present.
    ///
    /// Returns `false` without modifying anything if `name` is not a
    /// declared property.
    pub fn require(&mut self, name: &str) -> bool {
        if self.property(name).is_none() {
            return false;
        }
        let required = self.required.get_or_insert_with(Vec::new);
        if !required.iter().any(|r| r == name) {
            required.push(name.to_string());
        }
        true
    }

    /// Removes `name` from `required` if present.
    pub fn unrequire(&mut self, name: &str) {
        if let Some(required) = self.required.as_mut() {
            required.retain(|r| r != name);
        }
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required
            .as_ref()
            .is_some_and(|r| r.iter().any(|n| n == name))
    }

    /// Marks property `name` nullable and drops it from `required`.
    pub fn mark_nullable(&mut self, name: &str) -> bool {
        match self.property_mut(name) {
            Some(prop) => {
                prop.nullable = Some(true);
                self.unrequire(name);
                true
            }
            None => false,
        }
    }

    /// Records a custom error message for property `name`.
    pub fn set_error_message(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.error_message
            .get_or_insert_with(ErrorMessages::default)
            .properties
            .insert(name.into(), message.into());
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(false)
    }
}

/// Descriptor for the shape of array elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemShape {
    /// Shorthand for `{type: <ty>}`.
    Type(SchemaType),
    /// Elements validate against a class's Object Schema.
    Class(ClassId),
    /// A full schema, optionally with its own nested item shape.
    Described {
        schema: Box<Schema>,
        items: Option<Box<ItemShape>>,
    },
}

impl ItemShape {
    pub fn described(schema: Schema) -> Self {
        Self::Described {
            schema: Box::new(schema),
            items: None,
        }
    }

    /// An array node whose elements follow `items`.
    pub fn array_of(items: ItemShape) -> Self {
        Self::Described {
            schema: Box::new(Schema::of_type(SchemaType::Array)),
            items: Some(Box::new(items)),
        }
    }

    /// Resolves the descriptor, recursing into nested item shapes.
    pub fn to_schema(&self) -> Schema {
        match self {
            Self::Type(ty) => Schema::of_type(*ty),
            Self::Class(class) => Schema::of_type(TypeSpec::class(*class)),
            Self::Described { schema, items } => {
                let mut resolved = (**schema).clone();
                if let Some(items) = items {
                    resolved.items = Some(Items::Single(Box::new(items.to_schema())));
                }
                resolved
            }
        }
    }
}

impl From<SchemaType> for ItemShape {
    fn from(ty: SchemaType) -> Self {
        Self::Type(ty)
    }
}

impl From<ClassId> for ItemShape {
    fn from(class: ClassId) -> Self {
        Self::Class(class)
    }
}

impl From<Schema> for ItemShape {
    fn from(schema: Schema) -> Self {
        Self::described(schema)
    }
}
