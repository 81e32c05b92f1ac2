//! # pv-schema: Schema Composition & Runtime Validation
//!
//! Builds validation schemas from field and argument declarations on
//! registered classes, compiles them with the `jsonschema` crate, and
//! applies them to live values and method calls.
//!
//! ## Flow
//!
//! 1. Register classes on a [`SchemaRegistry`] (`register_class`,
//!    `register_subclass`).
//! 2. Declare fields with [`Field`] and method arguments with [`Param`],
//!    each carrying its constraints ([`Constrain`]).
//! 3. Finalize: `finalize_object_schema` / `finalize_method_schema`
//!    compile and cache a [`CompiledValidator`] on the class.
//! 4. Validate: `validate_object` for plain values, or
//!    [`SchemaRegistry::intercept`] to wrap a method so its positional
//!    arguments are validated, defaulted and transformed before it runs.
//!
//! Failures reach callers as [`pv_core::ValidationFailure`]:
//! `{code: "invalid_param", errors: [{field, message}]}`.
//!
//! ## Inheritance
//!
//! A subclass reads its ancestor's schemas until it declares something
//! itself, at which point it works on a private deep copy. Validators
//! compiled for the ancestor are never affected.
//!
//! ## Crate Policy
//!
//! - Depends only on `pv-core` internally.
//! - Declaration problems that leave a feature inert (unsupported
//!   constraint, missing or uncompilable schema) are [`Diagnostic`]s
//!   logged through `tracing`; only structural mistakes are errors.

pub mod builder;
pub mod compile;
pub mod config;
pub mod engine;
pub mod intercept;
pub mod message;
pub mod metadata;
pub mod registry;
pub mod resolve;
pub mod signature;

pub use builder::{Constrain, Constraint, Field, ItemShapes, Param, Target};
pub use compile::{render_schema, RenderedSchema};
pub use config::{Draft, EngineOptions};
pub use engine::{CompileError, CompiledValidator, FailureKind, RawFailure};
pub use intercept::{ErrorPolicy, Intercepted};
pub use message::{convert_errors, field_path};
pub use metadata::{ClassMetadata, MetadataKey, MetadataStore};
pub use registry::{ArgumentNames, Diagnostic, DiagnosticKind, SchemaRegistry};
pub use resolve::{DefaultTypeResolver, Family, NativeType, Reflect, TypeResolver};
