//! # Schema Builder
//!
//! Field and argument declarations, and the constraints attached to them.
//!
//! A [`Field`] (object property) or [`Param`] (method argument) collects
//! its options and an ordered list of [`Constraint`]s through the
//! [`Constrain`] trait, then [`SchemaRegistry::declare_prop`] or
//! [`SchemaRegistry::declare_arg`] applies the declaration and every
//! constraint in one pass. A constraint can therefore never reference a
//! field that does not exist yet.
//!
//! [`SchemaRegistry::attach_constraint`] stays available for incremental
//! declaration against an existing field or argument.
//!
//! ## Tolerance
//!
//! A constraint whose family is unsupported by the target's type is
//! reported as a diagnostic and skipped. Everything else that goes wrong
//! here is a [`ConfigError`].

use pv_core::{ClassId, ConfigError, ItemShape, Items, Schema, Transform, TypeSpec};
use serde_json::Value;
use tracing::debug;

use crate::registry::{DiagnosticKind, SchemaRegistry};
use crate::resolve::{Family, NativeType, Reflect};

/// Where a constraint is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A property of the class's Object Schema.
    Prop(String),
    /// A positional argument of a method.
    Arg { method: String, position: usize },
}

impl Target {
    pub fn prop(name: impl Into<String>) -> Self {
        Self::Prop(name.into())
    }

    pub fn arg(method: impl Into<String>, position: usize) -> Self {
        Self::Arg {
            method: method.into(),
            position,
        }
    }
}

/// Element shape(s) of an `array_item` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemShapes {
    /// Every element follows this shape.
    One(ItemShape),
    /// Every element follows at least one of these shapes.
    AnyOf(Vec<ItemShape>),
}

/// A single constraint declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Nullable,
    Enum(Vec<Value>),
    Const(Value),
    Maximum(f64),
    Minimum(f64),
    ExclusiveMaximum(f64),
    ExclusiveMinimum(f64),
    MultipleOf(f64),
    MaxLength(u64),
    MinLength(u64),
    Pattern(String),
    Format(String),
    MaxItems(u64),
    MinItems(u64),
    ArrayItem(ItemShapes),
    ArrayTuple(Vec<ItemShape>),
    Transform(Transform),
}

impl Constraint {
    /// Capability family, or `None` for universally supported constraints.
    pub fn family(&self) -> Option<Family> {
        let family = match self {
            Self::Nullable | Self::Enum(_) => return None,
            Self::Const(_) => Family::Const,
            Self::Maximum(_) => Family::Maximum,
            Self::Minimum(_) => Family::Minimum,
            Self::ExclusiveMaximum(_) => Family::ExclusiveMaximum,
            Self::ExclusiveMinimum(_) => Family::ExclusiveMinimum,
            Self::MultipleOf(_) => Family::MultipleOf,
            Self::MaxLength(_) => Family::MaxLength,
            Self::MinLength(_) => Family::MinLength,
            Self::Pattern(_) => Family::Pattern,
            Self::Format(_) => Family::Format,
            Self::MaxItems(_) => Family::MaxItems,
            Self::MinItems(_) => Family::MinItems,
            Self::ArrayItem(_) => Family::ArrayItem,
            Self::ArrayTuple(_) => Family::ArrayTuple,
            Self::Transform(_) => Family::Transform,
        };
        Some(family)
    }
}

/// Fluent constraint declarations shared by [`Field`] and [`Param`].
pub trait Constrain: Sized {
    fn constraints_mut(&mut self) -> &mut Vec<Constraint>;

    fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraints_mut().push(constraint);
        self
    }

    /// Accept `null` and drop the name from `required`.
    fn nullable(self) -> Self {
        self.constrain(Constraint::Nullable)
    }

    /// Restrict the value to an explicit list.
    fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constrain(Constraint::Enum(values.into_iter().map(Into::into).collect()))
    }

    fn constant(self, value: impl Into<Value>) -> Self {
        self.constrain(Constraint::Const(value.into()))
    }

    fn maximum(self, limit: impl Into<f64>) -> Self {
        self.constrain(Constraint::Maximum(limit.into()))
    }

    fn minimum(self, limit: impl Into<f64>) -> Self {
        self.constrain(Constraint::Minimum(limit.into()))
    }

    fn exclusive_maximum(self, limit: impl Into<f64>) -> Self {
        self.constrain(Constraint::ExclusiveMaximum(limit.into()))
    }

    fn exclusive_minimum(self, limit: impl Into<f64>) -> Self {
        self.constrain(Constraint::ExclusiveMinimum(limit.into()))
    }

    fn multiple_of(self, factor: impl Into<f64>) -> Self {
        self.constrain(Constraint::MultipleOf(factor.into()))
    }

    fn max_length(self, limit: u64) -> Self {
        self.constrain(Constraint::MaxLength(limit))
    }

    fn min_length(self, limit: u64) -> Self {
        self.constrain(Constraint::MinLength(limit))
    }

    fn pattern(self, pattern: impl Into<String>) -> Self {
        self.constrain(Constraint::Pattern(pattern.into()))
    }

    fn format(self, format: impl Into<String>) -> Self {
        self.constrain(Constraint::Format(format.into()))
    }

    fn max_items(self, limit: u64) -> Self {
        self.constrain(Constraint::MaxItems(limit))
    }

    fn min_items(self, limit: u64) -> Self {
        self.constrain(Constraint::MinItems(limit))
    }

    /// Every element follows `shape`.
    fn array_item(self, shape: impl Into<ItemShape>) -> Self {
        self.constrain(Constraint::ArrayItem(ItemShapes::One(shape.into())))
    }

    /// Every element follows at least one of `shapes`.
    fn array_any_of(self, shapes: impl IntoIterator<Item = ItemShape>) -> Self {
        self.constrain(Constraint::ArrayItem(ItemShapes::AnyOf(
            shapes.into_iter().collect(),
        )))
    }

    /// Fixed-arity tuple; also pins `minItems` and `maxItems`.
    fn array_tuple(self, shapes: impl IntoIterator<Item = ItemShape>) -> Self {
        self.constrain(Constraint::ArrayTuple(shapes.into_iter().collect()))
    }

    fn trim(self) -> Self {
        self.constrain(Constraint::Transform(Transform::Trim))
    }

    fn trim_start(self) -> Self {
        self.constrain(Constraint::Transform(Transform::TrimStart))
    }

    fn trim_end(self) -> Self {
        self.constrain(Constraint::Transform(Transform::TrimEnd))
    }

    fn to_lower_case(self) -> Self {
        self.constrain(Constraint::Transform(Transform::ToLowerCase))
    }

    fn to_upper_case(self) -> Self {
        self.constrain(Constraint::Transform(Transform::ToUpperCase))
    }
}

/// Declaration of an object property.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    ty: Option<TypeSpec>,
    native: Option<NativeType>,
    default: Option<Value>,
    message: Option<String>,
    constraints: Vec<Constraint>,
}

impl Field {
    /// A field with neither explicit nor native type. Declaring it fails
    /// unless [`Field::ty`] or [`Field::native`] is supplied.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            native: None,
            default: None,
            message: None,
            constraints: Vec::new(),
        }
    }

    /// A field whose native type is `T`.
    pub fn of<T: Reflect + ?Sized>(name: impl Into<String>) -> Self {
        Self::new(name).native(T::native_type())
    }

    /// Explicit schema type; wins over the native type.
    pub fn ty(mut self, ty: impl Into<TypeSpec>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn native(mut self, native: NativeType) -> Self {
        self.native = Some(native);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Message reported instead of any failure at or below this field.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Constrain for Field {
    fn constraints_mut(&mut self) -> &mut Vec<Constraint> {
        &mut self.constraints
    }
}

/// Declaration of a positional method argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    position: usize,
    name: Option<String>,
    ty: Option<TypeSpec>,
    native: Option<NativeType>,
    default: Option<Value>,
    constraints: Vec<Constraint>,
}

impl Param {
    /// The argument at zero-based `position`.
    pub fn at(position: usize) -> Self {
        Self {
            position,
            name: None,
            ty: None,
            native: None,
            default: None,
            constraints: Vec::new(),
        }
    }

    /// The argument at `position` whose native type is `T`.
    pub fn of<T: Reflect + ?Sized>(position: usize) -> Self {
        Self::at(position).native(T::native_type())
    }

    /// Explicit logical name; otherwise taken from the registered
    /// signature, or `arg<position>`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ty(mut self, ty: impl Into<TypeSpec>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn native(mut self, native: NativeType) -> Self {
        self.native = Some(native);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Constrain for Param {
    fn constraints_mut(&mut self) -> &mut Vec<Constraint> {
        &mut self.constraints
    }
}

#[derive(Clone, Copy)]
enum Scope<'a> {
    Object,
    Method(&'a str),
}

impl SchemaRegistry {
    /// Declare a property of `class` and apply its constraints in order.
    ///
    /// The property joins `required` unless a `nullable` constraint
    /// removes it again.
    ///
    /// # Errors
    ///
    /// `UnresolvableType` when the field has no explicit type and its
    /// native type has no mapping; `UnknownClass` for foreign handles.
    pub fn declare_prop(&mut self, class: ClassId, field: Field) -> Result<(), ConfigError> {
        let Field {
            name,
            ty,
            native,
            default,
            message,
            constraints,
        } = field;
        let ty = self.resolve_type(ty, native.as_ref(), || ConfigError::UnresolvableType {
            owner: format!("class {}", self.class_name(class)),
            name: name.clone(),
        })?;

        let schema = self.ensure_object_schema(class)?;
        if let Some(message) = message {
            schema.set_error_message(name.clone(), message);
        }
        schema.set_property(name.clone(), property_schema(ty, default));
        schema.require(&name);
        debug!(class = self.class_name(class), property = %name, "declared property");

        for constraint in constraints {
            self.constrain_entry(class, Scope::Object, &name, constraint)?;
        }
        Ok(())
    }

    /// Declare a positional argument of `class::method` and apply its
    /// constraints in order.
    ///
    /// # Errors
    ///
    /// As for [`SchemaRegistry::declare_prop`].
    pub fn declare_arg(
        &mut self,
        class: ClassId,
        method: &str,
        param: Param,
    ) -> Result<(), ConfigError> {
        let Param {
            position,
            name,
            ty,
            native,
            default,
            constraints,
        } = param;
        let name = name.unwrap_or_else(|| {
            self.signature_names(class, method)
                .get(position)
                .cloned()
                .unwrap_or_else(|| format!("arg{position}"))
        });
        let ty = self.resolve_type(ty, native.as_ref(), || ConfigError::UnresolvableType {
            owner: format!("function {}#{method}", self.class_name(class)),
            name: name.clone(),
        })?;

        self.ensure_argument_names(class, method)?
            .set(position, name.clone());
        let schema = self.ensure_method_schema(class, method)?;
        schema.set_property(name.clone(), property_schema(ty, default));
        schema.require(&name);
        debug!(
            class = self.class_name(class),
            method,
            position,
            argument = %name,
            "declared argument"
        );

        for constraint in constraints {
            self.constrain_entry(class, Scope::Method(method), &name, constraint)?;
        }
        Ok(())
    }

    /// Attach one constraint to an already declared property or argument.
    ///
    /// # Errors
    ///
    /// `UndeclaredProperty` / `UndeclaredArgument` when the target was
    /// never declared.
    pub fn attach_constraint(
        &mut self,
        class: ClassId,
        target: &Target,
        constraint: Constraint,
    ) -> Result<(), ConfigError> {
        match target {
            Target::Prop(name) => {
                let declared = self
                    .effective_object_schema(class)
                    .is_some_and(|s| s.property(name).is_some());
                if !declared {
                    return Err(ConfigError::UndeclaredProperty {
                        class: self.class_name(class).to_string(),
                        property: name.clone(),
                    });
                }
                self.constrain_entry(class, Scope::Object, name, constraint)
            }
            Target::Arg { method, position } => {
                let name = self
                    .argument_names(class, method)
                    .and_then(|names| names.get(*position))
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::UndeclaredArgument {
                        class: self.class_name(class).to_string(),
                        method: method.clone(),
                        position: *position,
                    })?;
                self.constrain_entry(class, Scope::Method(method), &name, constraint)
            }
        }
    }

    fn resolve_type(
        &self,
        explicit: Option<TypeSpec>,
        native: Option<&NativeType>,
        unresolvable: impl FnOnce() -> ConfigError,
    ) -> Result<TypeSpec, ConfigError> {
        if let Some(ty) = explicit {
            if let Some(class) = ty.as_class() {
                if !self.store.contains(class) {
                    return Err(ConfigError::UnknownClass(class));
                }
            }
            return Ok(ty);
        }
        native
            .and_then(|n| self.resolver.canonicalize(n, &self.store))
            .ok_or_else(unresolvable)
    }

    fn constrain_entry(
        &mut self,
        class: ClassId,
        scope: Scope<'_>,
        key: &str,
        constraint: Constraint,
    ) -> Result<(), ConfigError> {
        let outcome = match scope {
            Scope::Object => apply_constraint(self.ensure_object_schema(class)?, key, constraint),
            Scope::Method(method) => {
                apply_constraint(self.ensure_method_schema(class, method)?, key, constraint)
            }
        };
        if let Err(family) = outcome {
            let target = match scope {
                Scope::Object => format!("{}#{key}", self.class_name(class)),
                Scope::Method(method) => format!("{}#{method}#{key}", self.class_name(class)),
            };
            let message = format!("[{family}] {target} not supported");
            self.report(DiagnosticKind::UnsupportedConstraint, target, message);
        }
        Ok(())
    }
}

fn property_schema(ty: TypeSpec, default: Option<Value>) -> Schema {
    Schema {
        default,
        ..Schema::of_type(ty)
    }
}

/// Apply `constraint` to property `key` of `parent`.
///
/// Returns the rejected family when the property's type cannot carry it;
/// the schema is left untouched in that case.
pub fn apply_constraint(
    parent: &mut Schema,
    key: &str,
    constraint: Constraint,
) -> Result<(), Family> {
    if matches!(constraint, Constraint::Nullable) {
        parent.mark_nullable(key);
        return Ok(());
    }
    let Some(entry) = parent.property_mut(key) else {
        return Ok(());
    };
    if let Some(family) = constraint.family() {
        if !family.supports(entry.schema_type.as_ref()) {
            return Err(family);
        }
    }

    match constraint {
        Constraint::Nullable => {}
        Constraint::Enum(values) => entry.enumeration = Some(values),
        Constraint::Const(value) => entry.constant = Some(value),
        Constraint::Maximum(n) => entry.maximum = Some(n),
        Constraint::Minimum(n) => entry.minimum = Some(n),
        Constraint::ExclusiveMaximum(n) => entry.exclusive_maximum = Some(n),
        Constraint::ExclusiveMinimum(n) => entry.exclusive_minimum = Some(n),
        Constraint::MultipleOf(n) => entry.multiple_of = Some(n),
        Constraint::MaxLength(n) => entry.max_length = Some(n),
        Constraint::MinLength(n) => entry.min_length = Some(n),
        Constraint::Pattern(p) => entry.pattern = Some(p),
        Constraint::Format(f) => entry.format = Some(f),
        Constraint::MaxItems(n) => entry.max_items = Some(n),
        Constraint::MinItems(n) => entry.min_items = Some(n),
        Constraint::ArrayItem(ItemShapes::One(shape)) => {
            entry.items = Some(Items::Single(Box::new(shape.to_schema())));
        }
        Constraint::ArrayItem(ItemShapes::AnyOf(shapes)) => {
            let any_of = shapes.iter().map(ItemShape::to_schema).collect();
            entry.items = Some(Items::Single(Box::new(Schema {
                any_of: Some(any_of),
                ..Schema::default()
            })));
        }
        Constraint::ArrayTuple(shapes) => {
            let arity = shapes.len() as u64;
            entry.items = Some(Items::Tuple(shapes.iter().map(ItemShape::to_schema).collect()));
            entry.min_items = Some(arity);
            entry.max_items = Some(arity);
        }
        Constraint::Transform(transform) => {
            entry.transform.get_or_insert_with(Vec::new).push(transform);
        }
    }
    Ok(())
}
