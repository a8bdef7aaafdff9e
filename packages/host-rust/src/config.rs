//! Host configuration: defaults applied to every grid the host builds, plus
//! logging settings.

use std::path::{Path, PathBuf};

use autogrid_core::config::DEFAULT_NAMESPACE;
use autogrid_core::Overrides;
use serde::{Deserialize, Serialize};

/// Errors raised while loading a [`HostConfig`].
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Host-wide grid defaults, layered under each grid's own options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Persistence key prefix for every grid.
    pub namespace: String,
    /// Rewrite persisted column lists from declarations on every request.
    pub reload: bool,
    /// Restrict record queries to declared columns.
    pub auto_select: bool,
    pub log: LogConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            reload: false,
            auto_select: false,
            log: LogConfig::default(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `"info,autogrid_core=debug"`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl HostConfig {
    /// Parses a JSON document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`HostError::Parse`] for malformed JSON or unknown keys, and
    /// [`HostError::Invalid`] for values that fail validation.
    pub fn from_json_str(source: &str) -> Result<Self, HostError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// [`HostError::Io`] if the file cannot be read, otherwise as
    /// [`HostConfig::from_json_str`].
    pub fn from_path(path: &Path) -> Result<Self, HostError> {
        let source = std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    fn validate(&self) -> Result<(), HostError> {
        if self.namespace.trim().is_empty() {
            return Err(HostError::Invalid("namespace must not be empty".to_string()));
        }
        if self.log.filter.trim().is_empty() {
            return Err(HostError::Invalid("log.filter must not be empty".to_string()));
        }
        Ok(())
    }

    /// The table options this config contributes to every grid.
    #[must_use]
    pub fn table_overrides(&self) -> Overrides {
        Overrides::new()
            .set("namespace", self.namespace.as_str())
            .set("reload", self.reload)
            .set("auto_select", self.auto_select)
    }
}
