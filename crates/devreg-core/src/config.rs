//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables `DEVREG__<SECTION>__<KEY>`, e.g.
//!    `DEVREG__WARRANTY__OWNER_BONUS_MONTHS=12`
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! data_dir = "/var/lib/devreg"
//!
//! [warranty]
//! owner_bonus_months = 12
//! missing_passport_policy = "reject"
//!
//! [system]
//! timezone = "Europe/Sofia"
//! ```

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::warranty::WarrantyPolicy;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DEVREG";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DEVREG_CONFIG";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value was read but is not acceptable.
    #[error("Invalid configuration value for {field}: {message}")]
    Validation {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Writing the default file failed.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Persistence settings.
    pub storage: StorageConfig,

    /// Warranty rules.
    pub warranty: WarrantyPolicy,

    /// Locale settings.
    pub system: SystemConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_address: String,

    /// Port to bind.
    pub port: u16,

    /// Production logging (JSON files) instead of pretty stdout.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            production: false,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the registry snapshot. In-memory when unset.
    pub data_dir: Option<PathBuf>,
}

/// Locale settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// IANA timezone used to decide the current date.
    pub timezone: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from defaults, an optional file and the
    /// environment.
    ///
    /// A missing file is not an error; the defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value is invalid.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown timezone or an
    /// empty bind address.
    pub fn validate(&self) -> ConfigResult<()> {
        self.timezone()?;
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "server.bind_address",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The configured timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the name is not an IANA zone.
    pub fn timezone(&self) -> ConfigResult<Tz> {
        self.system
            .timezone
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "system.timezone",
                message: format!("unknown timezone '{}'", self.system.timezone),
            })
    }

    /// Write this configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolve which config file to read.
///
/// An explicit path wins, then `DEVREG_CONFIG`, then the platform config
/// directory (`~/.config/devreg/config.toml` on Linux).
#[must_use]
pub fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .or_else(|| {
            directories::ProjectDirs::from("", "", "devreg")
                .map(|dirs| dirs.config_dir().join("config.toml"))
        })
}
