//! Checks applied to a loaded [`CacheConfig`].

use crate::config::CacheConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `heartbeat_every` is 0
    /// - `cache_dir` is empty
    /// - `busy_timeout_ms` exceeds one minute
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_every == 0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat_every".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_dir".into(), reason: "must not be empty".into() });
        }

        if self.busy_timeout_ms > 60_000 {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms".into(),
                reason: "must not exceed 1 minute (60000ms)".into(),
            });
        }

        if !self.enabled {
            tracing::debug!("caching disabled; every parse will read the source file");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_heartbeat_zero() {
        let config = CacheConfig { heartbeat_every: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "heartbeat_every"));
    }

    #[test]
    fn test_validate_empty_cache_dir() {
        let config = CacheConfig { cache_dir: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_dir"));
    }

    #[test]
    fn test_validate_busy_timeout_exceeds_limit() {
        let config = CacheConfig { busy_timeout_ms: 60_001, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "busy_timeout_ms"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = CacheConfig { heartbeat_every: 1, busy_timeout_ms: 60_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
