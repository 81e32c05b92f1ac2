//! # pv-core: Foundational Types for pv
//!
//! This crate is the leaf of the pv dependency DAG. It defines the data
//! model every other crate speaks: the canonical [`Schema`] tree that
//! declarations accumulate into, the [`ClassId`] handle used to address a
//! registered class, and the uniform [`ValidationFailure`] shape handed to
//! callers when a validated call is rejected.
//!
//! ## Key Design Principles
//!
//! 1. **One schema representation.** Object schemas, method schemas and
//!    array item shapes are all [`Schema`] values. Keyword names follow
//!    JSON Schema (`minLength`, `exclusiveMaximum`, ...) when serialized.
//!
//! 2. **Class references are handles, not copies.** A property typed as
//!    another class stores [`TypeSpec::Class`]; the referenced schema is
//!    resolved when the owning schema is compiled.
//!
//! 3. **Field-addressed errors.** Every rejected value is reported as a
//!    list of [`FieldError`] entries with a dotted path, never as a raw
//!    engine error.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pv-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod failure;
pub mod identity;
pub mod schema;

pub use error::ConfigError;
pub use failure::{FieldError, ValidationFailure, INVALID_PARAM};
pub use identity::ClassId;
pub use schema::{ClassRef, ErrorMessages, ItemShape, Items, Schema, SchemaType, Transform, TypeSpec};
