//! Trust-on-first-use host key store backed by an OpenSSH known_hosts file

use std::path::{Path, PathBuf};

use russh_keys::key::PublicKey;
use thiserror::Error;

/// Outcome of a successful host key check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTrust {
    /// The key matched the recorded one
    Known,
    /// The host was unknown; its key has been recorded
    Learned,
}

#[derive(Debug, Error)]
pub enum TrustError {
    /// The host presented a different key than the recorded one
    #[error("host key changed (known_hosts line {line})")]
    Changed { line: usize },

    /// The file could not be read or appended to
    #[error("known_hosts error: {0}")]
    Store(String),
}

/// known_hosts file wrapper
#[derive(Debug, Clone)]
pub struct TrustStore {
    path: PathBuf,
}

impl TrustStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check `key` for `host:port`, recording it if the host is unknown.
    ///
    /// A recorded key is never overwritten.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<HostTrust, TrustError> {
        match russh_keys::check_known_hosts_path(host, port, key, &self.path) {
            Ok(true) => {
                tracing::debug!("Host key for {}:{} matches known_hosts", host, port);
                Ok(HostTrust::Known)
            }
            Ok(false) => {
                russh_keys::learn_known_hosts_path(host, port, key, &self.path)
                    .map_err(|e| TrustError::Store(e.to_string()))?;
                tracing::info!(
                    "Recorded new host key for {}:{} ({} {}) in {}",
                    host,
                    port,
                    key.name(),
                    key.fingerprint(),
                    self.path.display()
                );
                Ok(HostTrust::Learned)
            }
            Err(russh_keys::Error::KeyChanged { line }) => {
                tracing::error!(
                    "Host key for {}:{} differs from known_hosts line {} (offered {} {})",
                    host,
                    port,
                    line,
                    key.name(),
                    key.fingerprint()
                );
                Err(TrustError::Changed { line })
            }
            Err(e) => Err(TrustError::Store(e.to_string())),
        }
    }
}
