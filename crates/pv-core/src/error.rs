//! # Configuration Errors
//!
//! Declaration-time failures that abort the declaration step they occur
//! in. The enclosing class or method stays partially configured.
//!
//! Recoverable declaration problems (an unsupported constraint family, a
//! schema that does not compile) are not errors: they are reported as
//! diagnostics by the registry and the affected feature stays inert.

use thiserror::Error;

use crate::identity::ClassId;

/// Fatal declaration-time error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No explicit type was given and none could be resolved from the
    /// native type of the field or argument.
    #[error("please specify the type of {name} in {owner}")]
    UnresolvableType {
        /// Class (and method, for arguments) owning the declaration.
        owner: String,
        /// Property or argument name.
        name: String,
    },

    /// A constraint targeted a property that was never declared.
    #[error("please declare property {property} of {class} before constraining it")]
    UndeclaredProperty {
        /// Class name.
        class: String,
        /// Property name.
        property: String,
    },

    /// A constraint targeted a method argument that was never declared.
    #[error("please declare argument {position} of {class}#{method} before constraining it")]
    UndeclaredArgument {
        /// Class name.
        class: String,
        /// Method name.
        method: String,
        /// Zero-based parameter position.
        position: usize,
    },

    /// The class handle was not issued by this registry.
    #[error("unknown class {0}")]
    UnknownClass(ClassId),

    /// An environment setting could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidSetting {
        /// Setting name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },
}
