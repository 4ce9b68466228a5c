//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod cache;
pub mod database;
pub mod hierarchy;
pub mod logging;

use serde::{Deserialize, Serialize};

pub use self::cache::TreeCacheConfig;
pub use self::database::DatabaseConfig;
pub use self::hierarchy::{BackendKind, HierarchyConfig};
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Category hierarchy settings.
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    /// Tree read cache settings.
    #[serde(default)]
    pub cache: TreeCacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Reads `path` (for example `config/default.toml`), then the overlay
    /// `config/{env}.toml`, then environment variables prefixed with
    /// `LEARNSHARE__`. Missing files are skipped.
    pub fn load(path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LEARNSHARE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_from_empty_document() {
        let config: AppConfig = config::Config::builder()
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("empty config should use defaults");

        assert_eq!(config.hierarchy.backend, BackendKind::Postgres);
        assert_eq!(config.hierarchy.lock_timeout_ms, 5_000);
        assert!(config.cache.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            [hierarchy]
            backend = "memory"
            default_delete_policy = "cascade"
            picker_depth = 3

            [logging]
            format = "pretty"
        "#;
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("valid overlay");

        assert_eq!(config.hierarchy.backend, BackendKind::Memory);
        assert_eq!(
            config.hierarchy.default_delete_policy,
            crate::types::DeletePolicy::Cascade
        );
        assert_eq!(config.hierarchy.picker_depth, 3);
        assert_eq!(config.logging.format, "pretty");
    }
}
