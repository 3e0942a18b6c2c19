//! Persistent configuration store

use std::path::{Path, PathBuf};

use super::{load_config, save_config, AppConfig};
use crate::error::ConfigError;

/// Loads and persists the application configuration.
///
/// `load` reports a missing file as [`ConfigError::NotFound`] so callers can
/// start unconfigured instead of failing.
pub trait ConfigStore: Send + Sync {
    /// Load the configuration
    fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Persist the configuration
    fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    /// Location shown to the user
    fn location(&self) -> String;
}

/// TOML file backed store
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TomlConfigStore {
    fn default() -> Self {
        Self::new(super::default_config_path())
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = load_config(&self.path)?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        save_config(&self.path, config)?;
        tracing::debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
