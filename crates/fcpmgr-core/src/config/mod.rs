//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod allocator;
pub mod database;
pub mod logging;

use serde::{Deserialize, Serialize};

pub use self::allocator::AllocatorConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::{LogFormat, LoggingConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration file and `FCPMGR__*` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// FCP database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Device selection settings.
    #[serde(default)]
    pub allocator: AllocatorConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Merges the given file (optional, so a missing file falls back to the
    /// built-in defaults), an optional `<dir>/<env>.toml` overlay selected by
    /// `FCPMGR_ENV`, and environment variables prefixed with `FCPMGR__`.
    pub fn load(config_path: &str) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false));

        if let Ok(env) = std::env::var("FCPMGR_ENV") {
            let overlay = std::path::Path::new(config_path)
                .parent()
                .map(|dir| dir.join(&env))
                .unwrap_or_else(|| std::path::PathBuf::from(&env));
            builder = builder.add_source(
                config::File::with_name(&overlay.to_string_lossy()).required(false),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("FCPMGR")
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
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist").expect("defaults should load");
        assert_eq!(config.database.url, "sqlite://data/fcp.sqlite");
        assert!(!config.allocator.same_index_policy);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
