//! Cache settings.
//!
//! Values come from built-in defaults, then an optional TOML file named by
//! `GEDCACHE_CONFIG_FILE`, then `GEDCACHE_*` environment variables. Later
//! layers override earlier ones.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::connection::ConnectionOptions;

mod validation;

pub use validation::ConfigError;

/// Settings for [`CachingFacade`](crate::CachingFacade).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether parsed records are cached at all.
    ///
    /// Set via GEDCACHE_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding one cache file per source file.
    ///
    /// Set via GEDCACHE_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Records written between two heartbeat callbacks during a fill.
    ///
    /// Set via GEDCACHE_HEARTBEAT_EVERY environment variable.
    #[serde(default = "default_heartbeat_every")]
    pub heartbeat_every: usize,

    /// SQLite busy timeout in milliseconds.
    ///
    /// Set via GEDCACHE_BUSY_TIMEOUT_MS environment variable.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.gedcache")
}

fn default_heartbeat_every() -> usize {
    500
}

fn default_busy_timeout_ms() -> u64 {
    1_500
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: default_cache_dir(),
            heartbeat_every: default_heartbeat_every(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl CacheConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Connection settings shared by the writer and every reader.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions { busy_timeout: self.busy_timeout() }
    }

    /// Read defaults, the optional TOML file and the environment, then validate.
    ///
    /// A nested key such as `a.b` is spelled `GEDCACHE_A__B` in the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file named by `GEDCACHE_CONFIG_FILE` is not valid TOML
    /// - A `GEDCACHE_*` value has the wrong type
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GEDCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("GEDCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(&figment)
    }

    /// Extract from an already-layered figment. Used directly by tests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` if extraction fails and
    /// `ConfigError::Invalid` if validation does.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
