//! Connection target configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::TransportKind;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Key files tried, in order, when a target names no identity file
const DEFAULT_IDENTITY_FILES: &[&str] = &["id_rsa", "id_ed25519", "id_ecdsa"];

/// Where the monitor agent runs and how to reach it.
///
/// Targets are immutable once handed to a monitor client; switching servers
/// builds a new target instead of editing the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Display name (usually the ssh config alias)
    #[serde(default)]
    pub name: String,

    /// Host name or address
    #[serde(default)]
    pub host: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote user name
    #[serde(default)]
    pub user: String,

    /// Private key used for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,

    /// Local sandbox to use instead of a remote shell.
    ///
    /// `Some("")` selects the sandbox's default distribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl ConnectionTarget {
    /// Create a remote-shell target
    pub fn remote(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: String::new(),
            identity_file: None,
            sandbox: None,
        }
    }

    /// Create a local-sandbox target; an empty name uses the default distribution
    pub fn sandbox(distribution: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            user: String::new(),
            identity_file: None,
            sandbox: Some(distribution.into()),
        }
    }

    /// Which transport this target selects
    pub fn transport(&self) -> TransportKind {
        if self.sandbox.is_some() {
            TransportKind::LocalSandbox
        } else {
            TransportKind::RemoteShell
        }
    }

    /// Label shown to the user
    pub fn display_name(&self) -> String {
        match self.sandbox.as_deref() {
            Some("") => "Sandbox".to_string(),
            Some(distro) => format!("Sandbox: {}", distro),
            None if !self.name.is_empty() => self.name.clone(),
            None => self.host.clone(),
        }
    }

    /// `host:port` address for dialing
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// User name for authentication, falling back to the local user
    pub fn effective_user(&self) -> String {
        if self.user.is_empty() {
            whoami::username()
        } else {
            self.user.clone()
        }
    }

    /// Resolve the private key path.
    ///
    /// Uses the configured identity file when present, otherwise the first of
    /// `~/.ssh/id_rsa`, `id_ed25519`, `id_ecdsa` that exists, and finally
    /// `~/.ssh/id_rsa` so the error message names a sensible path.
    pub fn identity_path(&self) -> PathBuf {
        if let Some(path) = &self.identity_file {
            return expand_home(path);
        }

        let ssh_dir = dirs::home_dir().unwrap_or_default().join(".ssh");
        DEFAULT_IDENTITY_FILES
            .iter()
            .map(|name| ssh_dir.join(name))
            .find(|path| path.exists())
            .unwrap_or_else(|| ssh_dir.join(DEFAULT_IDENTITY_FILES[0]))
    }

    /// Check the fields the selected transport needs
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.transport() == TransportKind::RemoteShell && self.host.is_empty() {
            return Err(crate::error::ConfigError::MissingField(
                "target.host".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
