//! Configuration for the session store and its external sweeper.
//!
//! Parsed from a `tenure.toml` file:
//!
//! ```toml
//! [store]
//! default_ttl_secs = 3600
//! storage_path = "./data/sessions"
//!
//! [sweep]
//! interval_secs = 60
//! ```

use crate::{TenureError, TenureResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full contents of a `tenure.toml` file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenureConfig {
    /// `[store]` section.
    #[serde(default)]
    pub store: StoreConfig,
    /// `[sweep]` section.
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Settings consumed when constructing a session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Lifetime applied when a create call omits a TTL.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Directory mirroring one file per session. `None` keeps the store in memory.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

/// Settings for the periodic `cleanup_expired` caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between two cleanup passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            storage_path: None,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl StoreConfig {
    /// In-memory configuration with the given default TTL.
    pub fn in_memory(default_ttl_secs: u64) -> Self {
        Self {
            default_ttl_secs,
            storage_path: None,
        }
    }

    /// Sets the persistence directory.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Rejects a zero TTL or an empty storage path.
    pub fn validate(&self) -> TenureResult<()> {
        validate_ttl(self.default_ttl_secs)?;
        if let Some(path) = &self.storage_path {
            if path.as_os_str().is_empty() {
                return Err(TenureError::config("storage_path must not be empty"));
            }
        }
        Ok(())
    }
}

impl SweepConfig {
    /// Rejects a zero interval.
    pub fn validate(&self) -> TenureResult<()> {
        if self.interval_secs == 0 {
            return Err(TenureError::config(
                "sweep interval_secs must be a positive number of seconds",
            ));
        }
        Ok(())
    }
}

impl TenureConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> TenureResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| TenureError::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> TenureResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            TenureError::config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&source)
    }

    /// Like [`TenureConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> TenureResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validates every section.
    pub fn validate(&self) -> TenureResult<()> {
        self.store.validate()?;
        self.sweep.validate()
    }
}

/// Rejects a TTL of zero seconds.
pub fn validate_ttl(ttl_secs: u64) -> TenureResult<()> {
    if ttl_secs == 0 {
        return Err(TenureError::config(
            "TTL must be a positive number of seconds",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = TenureConfig::from_toml_str("").unwrap();
        assert_eq!(config.store.default_ttl_secs, 3600);
        assert!(config.store.storage_path.is_none());
        assert_eq!(config.sweep.interval_secs, 60);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = TenureConfig::from_toml_str("[store]\ndefault_ttl_secs = 0\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = TenureConfig::from_toml_str("[sweep]\ninterval_secs = 0\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn negative_ttl_fails_to_parse() {
        let err = TenureConfig::from_toml_str("[store]\ndefault_ttl_secs = -5\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn builder_sets_storage_path() {
        let config = StoreConfig::in_memory(30).with_storage_path("/tmp/sessions");
        assert_eq!(config.default_ttl_secs, 30);
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/sessions")));
        config.validate().unwrap();
    }
}
