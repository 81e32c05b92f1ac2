//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Validators are compiled once at startup and
//! shared read-only.

use std::sync::Arc;

use pv_core::ConfigError;
use pv_schema::EngineOptions;

use crate::schemas::Schemas;

/// Server configuration read from the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerConfig {
    /// `PORT`, default 8080.
    pub port: u16,
    /// Validator engine settings (`PV_DRAFT`, `PV_VALIDATE_FORMATS`, ...).
    pub engine: EngineOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            engine: EngineOptions::default(),
        }
    }
}

impl ServerConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// An unparsable `PORT` falls back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let engine = EngineOptions::from_lookup(&lookup)?;
        Ok(Self { port, engine })
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub schemas: Arc<Schemas>,
}

impl AppState {
    /// Create state with default configuration.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(ServerConfig::default())
    }

    /// Create state with the given configuration, compiling every schema.
    pub fn with_config(config: ServerConfig) -> anyhow::Result<Self> {
        let schemas = Schemas::build(config.engine)?;
        if schemas.warnings > 0 {
            tracing::warn!(count = schemas.warnings, "schemas compiled with warnings");
        }
        Ok(Self {
            config,
            schemas: Arc::new(schemas),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_schema::Draft;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn reads_port_and_engine() {
        let config =
            ServerConfig::from_lookup(lookup(&[("PORT", "9090"), ("PV_DRAFT", "2020-12")])).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.engine.draft, Draft::Draft202012);
    }

    #[test]
    fn bad_port_falls_back() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn bad_engine_setting_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PV_ALL_ERRORS", "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }

    #[test]
    fn state_compiles_schemas() {
        let state = AppState::new().unwrap();
        assert!(state.schemas.search.is_validating());
    }
}
