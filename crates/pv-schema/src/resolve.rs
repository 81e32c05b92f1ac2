//! # Type Resolver
//!
//! Maps a native type indicator to a canonical schema type, and decides
//! which constraint families are legal for a schema type.
//!
//! There is no ambient reflection: a declaration either carries an
//! explicit [`TypeSpec`] or a [`NativeType`] supplied at construction
//! time (usually through [`Reflect`], e.g. `Field::of::<String>("name")`).
//! The [`TypeResolver`] turns the latter into a `TypeSpec`; registries use
//! [`DefaultTypeResolver`] unless the caller installs another one.

use pv_core::{ClassId, SchemaType, TypeSpec};

use crate::metadata::{MetadataStore, ObjectSchemaKey};

/// Native type of a field or parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    String,
    Boolean,
    Number,
    Integer,
    Array,
    /// A registered class, validated against its Object Schema.
    Class(ClassId),
    /// Anything without a schema mapping.
    Other(&'static str),
}

/// Rust types with a known native type.
pub trait Reflect {
    fn native_type() -> NativeType;
}

macro_rules! reflect {
    ($native:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Reflect for $ty {
                fn native_type() -> NativeType {
                    $native
                }
            }
        )+
    };
}

reflect!(NativeType::String => String, str, char);
reflect!(NativeType::Boolean => bool);
reflect!(NativeType::Number => f32, f64);
reflect!(NativeType::Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl<T> Reflect for Vec<T> {
    fn native_type() -> NativeType {
        NativeType::Array
    }
}

impl<T> Reflect for [T] {
    fn native_type() -> NativeType {
        NativeType::Array
    }
}

impl<T, const N: usize> Reflect for [T; N] {
    fn native_type() -> NativeType {
        NativeType::Array
    }
}

impl<T: Reflect + ?Sized> Reflect for &T {
    fn native_type() -> NativeType {
        T::native_type()
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn native_type() -> NativeType {
        T::native_type()
    }
}

/// Resolves native types to schema types.
pub trait TypeResolver: Send + Sync {
    /// Canonical type for `native`, or `None` when no mapping applies.
    fn canonicalize(&self, native: &NativeType, store: &MetadataStore) -> Option<TypeSpec>;
}

/// The built-in mapping: primitives map to their schema type, classes
/// resolve only if they (or an ancestor) carry an Object Schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeResolver;

impl TypeResolver for DefaultTypeResolver {
    fn canonicalize(&self, native: &NativeType, store: &MetadataStore) -> Option<TypeSpec> {
        let ty = match native {
            NativeType::String => SchemaType::String,
            NativeType::Boolean => SchemaType::Boolean,
            NativeType::Number => SchemaType::Number,
            NativeType::Integer => SchemaType::Integer,
            NativeType::Array => SchemaType::Array,
            NativeType::Class(class) => {
                return store
                    .has::<ObjectSchemaKey>(*class)
                    .then(|| TypeSpec::class(*class));
            }
            NativeType::Other(_) => return None,
        };
        Some(TypeSpec::Single(ty))
    }
}

/// Constraint families subject to capability checks.
///
/// `enum` and `nullable` are universally supported and have no family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Const,
    Maximum,
    Minimum,
    ExclusiveMaximum,
    ExclusiveMinimum,
    MultipleOf,
    MaxLength,
    MinLength,
    Pattern,
    Format,
    Transform,
    MaxItems,
    MinItems,
    ArrayItem,
    ArrayTuple,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Const => "const",
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::ExclusiveMaximum => "exclusiveMaximum",
            Self::ExclusiveMinimum => "exclusiveMinimum",
            Self::MultipleOf => "multipleOf",
            Self::MaxLength => "maxLength",
            Self::MinLength => "minLength",
            Self::Pattern => "pattern",
            Self::Format => "format",
            Self::Transform => "transform",
            Self::MaxItems => "maxItems",
            Self::MinItems => "minItems",
            Self::ArrayItem => "arrayItem",
            Self::ArrayTuple => "arrayTuple",
        }
    }

    /// Whether this family may be declared on a node of type `ty`.
    ///
    /// For unions, a family is supported when any member supports it.
    pub fn supports(&self, ty: Option<&TypeSpec>) -> bool {
        let Some(ty) = ty else {
            return matches!(self, Self::Const);
        };
        match self {
            Self::Const => true,
            Self::Maximum
            | Self::Minimum
            | Self::ExclusiveMaximum
            | Self::ExclusiveMinimum
            | Self::MultipleOf => {
                ty.includes(SchemaType::Number) || ty.includes(SchemaType::Integer)
            }
            Self::MaxLength | Self::MinLength | Self::Pattern | Self::Format | Self::Transform => {
                ty.includes(SchemaType::String)
            }
            Self::MaxItems | Self::MinItems | Self::ArrayItem | Self::ArrayTuple => {
                ty.includes(SchemaType::Array)
            }
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function form of [`Family::supports`].
pub fn supports(family: Family, ty: &TypeSpec) -> bool {
    family.supports(Some(ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::Schema;

    #[test]
    fn reflect_maps_rust_types() {
        assert_eq!(String::native_type(), NativeType::String);
        assert_eq!(<&str>::native_type(), NativeType::String);
        assert_eq!(bool::native_type(), NativeType::Boolean);
        assert_eq!(f64::native_type(), NativeType::Number);
        assert_eq!(u32::native_type(), NativeType::Integer);
        assert_eq!(Vec::<String>::native_type(), NativeType::Array);
        assert_eq!(<[u8; 4]>::native_type(), NativeType::Array);
        assert_eq!(Option::<f32>::native_type(), NativeType::Number);
    }

    #[test]
    fn default_resolver_maps_primitives() {
        let store = MetadataStore::new();
        let resolver = DefaultTypeResolver;
        assert_eq!(
            resolver.canonicalize(&NativeType::String, &store),
            Some(TypeSpec::Single(SchemaType::String))
        );
        assert_eq!(resolver.canonicalize(&NativeType::Other("Date"), &store), None);
    }

    #[test]
    fn class_resolves_only_with_schema() {
        let mut store = MetadataStore::new();
        let bare = store.register("Bare", None).unwrap();
        let base = store.register("Base", None).unwrap();
        let derived = store.register("Derived", Some(base)).unwrap();
        store.define::<ObjectSchemaKey>(base, Schema::object()).unwrap();

        let resolver = DefaultTypeResolver;
        assert_eq!(resolver.canonicalize(&NativeType::Class(bare), &store), None);
        assert_eq!(
            resolver.canonicalize(&NativeType::Class(derived), &store),
            Some(TypeSpec::class(derived))
        );
    }

    #[test]
    fn capability_table() {
        let number = TypeSpec::Single(SchemaType::Number);
        let integer = TypeSpec::Single(SchemaType::Integer);
        let string = TypeSpec::Single(SchemaType::String);
        let array = TypeSpec::Single(SchemaType::Array);

        assert!(supports(Family::Const, &string));
        assert!(supports(Family::Minimum, &number));
        assert!(supports(Family::MultipleOf, &integer));
        assert!(!supports(Family::Minimum, &string));
        assert!(supports(Family::Pattern, &string));
        assert!(!supports(Family::Pattern, &number));
        assert!(supports(Family::Transform, &string));
        assert!(supports(Family::ArrayTuple, &array));
        assert!(!supports(Family::MaxItems, &string));
    }

    #[test]
    fn unions_support_any_member_family() {
        let union = TypeSpec::Union(vec![SchemaType::String, SchemaType::Null]);
        assert!(supports(Family::MaxLength, &union));
        assert!(!supports(Family::Maximum, &union));
    }

    #[test]
    fn class_types_only_accept_const() {
        let class = TypeSpec::class(ClassId(0));
        assert!(supports(Family::Const, &class));
        assert!(!supports(Family::Pattern, &class));
        assert!(!supports(Family::MinItems, &class));
    }
}
