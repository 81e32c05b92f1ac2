//! Validator engine configuration.
//!
//! One [`EngineOptions`] value is installed per registry and applies to
//! every schema that registry compiles. Override via environment
//! variables or explicit construction.

use pv_core::ConfigError;

/// JSON Schema dialect used to compile schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Draft {
    /// Draft 7. Tuples render as `items: [...]`.
    #[default]
    Draft7,
    /// Draft 2020-12. Tuples render as `prefixItems: [...]`.
    Draft202012,
}

impl Draft {
    pub(crate) fn engine_draft(&self) -> jsonschema::Draft {
        match self {
            Self::Draft7 => jsonschema::Draft::Draft7,
            Self::Draft202012 => jsonschema::Draft::Draft202012,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "7" | "draft7" | "draft-07" => Some(Self::Draft7),
            "2020-12" | "draft2020-12" | "draft202012" => Some(Self::Draft202012),
            _ => None,
        }
    }
}

/// Settings of the validator engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub draft: Draft,
    /// Assert `format` keywords instead of treating them as annotations.
    pub validate_formats: bool,
    /// Insert declared defaults for absent properties before validating.
    pub use_defaults: bool,
    /// Report every failure instead of stopping at the first one.
    pub all_errors: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            draft: Draft::Draft7,
            validate_formats: true,
            use_defaults: true,
            all_errors: true,
        }
    }
}

impl EngineOptions {
    /// Load options from environment variables.
    ///
    /// Variables:
    /// - `PV_DRAFT` (`7` or `2020-12`, default: `7`)
    /// - `PV_VALIDATE_FORMATS` (default: `true`)
    /// - `PV_USE_DEFAULTS` (default: `true`)
    /// - `PV_ALL_ERRORS` (default: `true`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load options through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let draft = match lookup("PV_DRAFT") {
            Some(raw) => Draft::parse(&raw).ok_or_else(|| ConfigError::InvalidSetting {
                key: "PV_DRAFT".to_string(),
                value: raw,
            })?,
            None => defaults.draft,
        };
        Ok(Self {
            draft,
            validate_formats: env_bool(&lookup, "PV_VALIDATE_FORMATS", defaults.validate_formats)?,
            use_defaults: env_bool(&lookup, "PV_USE_DEFAULTS", defaults.use_defaults)?,
            all_errors: env_bool(&lookup, "PV_ALL_ERRORS", defaults.all_errors)?,
        })
    }

    /// Engine build options for this configuration.
    pub(crate) fn validation_options(&self) -> jsonschema::ValidationOptions {
        let mut opts = jsonschema::options();
        opts.with_draft(self.draft.engine_draft());
        opts.should_validate_formats(self.validate_formats);
        opts
    }
}

fn env_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidSetting {
            key: key.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let opts = EngineOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(opts, EngineOptions::default());
    }

    #[test]
    fn parses_overrides() {
        let opts = EngineOptions::from_lookup(lookup(&[
            ("PV_DRAFT", "2020-12"),
            ("PV_USE_DEFAULTS", "off"),
            ("PV_ALL_ERRORS", "0"),
        ]))
        .unwrap();
        assert_eq!(opts.draft, Draft::Draft202012);
        assert!(!opts.use_defaults);
        assert!(!opts.all_errors);
        assert!(opts.validate_formats);
    }

    #[test]
    fn rejects_malformed_bool() {
        let err = EngineOptions::from_lookup(lookup(&[("PV_VALIDATE_FORMATS", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { ref key, .. } if key == "PV_VALIDATE_FORMATS"));
    }

    #[test]
    fn rejects_unknown_draft() {
        let err = EngineOptions::from_lookup(lookup(&[("PV_DRAFT", "4")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }
}
