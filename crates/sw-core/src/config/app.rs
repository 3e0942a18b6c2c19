//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use super::ConnectionTarget;
use crate::error::ConfigError;

/// Configuration for the sesswatch client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Enable debug logging
    pub debug: bool,

    /// Sessions not updated for this long are shown as stale (0 disables)
    #[serde(with = "duration_secs")]
    pub status_timeout: Duration,

    /// Bound on waiting for the agent's version frame
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// Bound on the initial transport dial
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Trust store for remote host keys
    pub known_hosts_path: PathBuf,

    /// Conventional host-alias file used for discovery
    pub ssh_config_path: PathBuf,

    /// Executable used to reach the local sandbox
    pub sandbox_command: String,

    /// Directory (relative to the target's home) holding the agent scripts
    pub install_dir: String,

    /// Active connection target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ConnectionTarget>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let ssh_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ssh");

        Self {
            debug: false,
            status_timeout: Duration::from_secs(300),
            handshake_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            known_hosts_path: ssh_dir.join("known_hosts"),
            ssh_config_path: ssh_dir.join("config"),
            sandbox_command: "wsl".to_string(),
            install_dir: ".sesswatch".to_string(),
            target: None,
        }
    }
}

impl AppConfig {
    /// Build a new configuration with `target` as the active target.
    ///
    /// The receiver is left untouched; callers swap the returned value in.
    pub fn with_target(&self, target: ConnectionTarget) -> Self {
        Self {
            target: Some(target),
            ..self.clone()
        }
    }

    /// Stale marking threshold, `None` when disabled
    pub fn stale_after(&self) -> Option<Duration> {
        if self.status_timeout.is_zero() {
            None
        } else {
            Some(self.status_timeout)
        }
    }

    /// Check values the transports depend on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "handshake_timeout must be at least 1 second".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect_timeout must be at least 1 second".to_string(),
            ));
        }
        if self.sandbox_command.trim().is_empty() {
            return Err(ConfigError::MissingField("sandbox_command".to_string()));
        }
        if self.install_dir.trim().is_empty() || self.install_dir.contains("..") {
            return Err(ConfigError::Invalid(format!(
                "install_dir '{}' must be a plain directory name",
                self.install_dir
            )));
        }
        if let Some(target) = &self.target {
            target.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.stale_after(), Some(Duration::from_secs(300)));
        assert!(config.target.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            handshake_timeout = 8
            status_timeout = 0

            [target]
            name = "build"
            host = "build.internal"
            user = "ci"
            "#,
        )
        .unwrap();

        assert_eq!(config.handshake_timeout, Duration::from_secs(8));
        assert_eq!(config.stale_after(), None);
        assert_eq!(config.sandbox_command, "wsl");
        let target = config.target.unwrap();
        assert_eq!(target.host, "build.internal");
        assert_eq!(target.port, 22);
    }

    #[test]
    fn test_with_target_leaves_original_untouched() {
        let original = AppConfig::default();
        let switched = original.with_target(ConnectionTarget::sandbox("Ubuntu"));

        assert!(original.target.is_none());
        assert_eq!(switched.target.as_ref().unwrap().display_name(), "Sandbox: Ubuntu");
        assert_eq!(switched.handshake_timeout, original.handshake_timeout);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.handshake_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.install_dir = "../escape".to_string();
        assert!(config.validate().is_err());

        let config = AppConfig::default().with_target(ConnectionTarget::remote("x", ""));
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_serialize_round_trip_with_target() {
        let config = AppConfig::default().with_target(ConnectionTarget::remote("dev", "10.1.1.1"));
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[target]"));
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
