//! Outbound SSH connection setup
//!
//! Loads the private key, dials the target with a bounded timeout, checks the
//! host key against the trust store and authenticates with the key.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::Disconnect;
use russh_keys::key::{KeyPair, PublicKey};
use thiserror::Error;

use sw_core::config::ConnectionTarget;
use sw_core::error::TransportError;

use super::known_hosts::{TrustError, TrustStore};

/// Load a private key, mapping every failure to [`TransportError::KeyNotFound`]
pub(crate) fn load_key(path: &Path) -> Result<Arc<KeyPair>, TransportError> {
    if !path.exists() {
        return Err(TransportError::KeyNotFound {
            path: path.to_path_buf(),
            message: "File does not exist".to_string(),
        });
    }

    let key = russh_keys::load_secret_key(path, None).map_err(|e| TransportError::KeyNotFound {
        path: path.to_path_buf(),
        message: format!("Failed to load key: {}", e),
    })?;

    Ok(Arc::new(key))
}

/// Errors raised from inside the SSH handshake
#[derive(Debug, Error)]
pub(crate) enum HandlerError {
    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error(transparent)]
    Ssh(#[from] russh::Error),
}

/// SSH client handler that enforces trust-on-first-use
pub(crate) struct HostKeyVerifier {
    trust: TrustStore,
    host: String,
    port: u16,
}

impl HostKeyVerifier {
    fn new(trust: TrustStore, host: &str, port: u16) -> Self {
        Self {
            trust,
            host: host.to_string(),
            port,
        }
    }
}

#[async_trait]
impl client::Handler for HostKeyVerifier {
    type Error = HandlerError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Server host key: {}", server_public_key.fingerprint());
        self.trust.verify(&self.host, self.port, server_public_key)?;
        Ok(true)
    }
}

/// Authenticated SSH session
pub(crate) type SshHandle = Handle<HostKeyVerifier>;

/// Dial, verify and authenticate
pub(crate) async fn open_session(
    target: &ConnectionTarget,
    known_hosts: &Path,
    connect_timeout: Duration,
) -> Result<SshHandle, TransportError> {
    let key = load_key(&target.identity_path())?;
    let address = target.address();
    let user = target.effective_user();

    let ssh_config = Arc::new(Config::default());
    let handler = HostKeyVerifier::new(TrustStore::new(known_hosts), &target.host, target.port);

    tracing::debug!("Connecting to {}", address);
    let mut session = tokio::time::timeout(
        connect_timeout,
        client::connect(ssh_config, address.as_str(), handler),
    )
    .await
    .map_err(|_| TransportError::Timeout {
        address: address.clone(),
        timeout: connect_timeout,
    })?
    .map_err(|e| match e {
        HandlerError::Trust(TrustError::Changed { line }) => TransportError::HostKeyChanged {
            host: target.host.clone(),
            line,
        },
        HandlerError::Trust(TrustError::Store(message)) => TransportError::HostKeyStore(message),
        HandlerError::Ssh(e) => TransportError::Dial {
            address: address.clone(),
            message: e.to_string(),
        },
    })?;

    tracing::debug!("Authenticating as user '{}'", user);
    let authenticated = session
        .authenticate_publickey(&user, key)
        .await
        .map_err(|e| TransportError::Ssh(format!("Authentication error: {}", e)))?;

    if !authenticated {
        let _ = session
            .disconnect(Disconnect::ByApplication, "authentication failed", "en")
            .await;
        return Err(TransportError::AuthRejected { user });
    }

    tracing::info!("Connected to {} as {}", address, user);
    Ok(session)
}

/// Politely end a session, ignoring failures
pub(crate) async fn disconnect(session: &SshHandle) {
    if let Err(e) = session
        .disconnect(Disconnect::ByApplication, "closing", "en")
        .await
    {
        tracing::debug!("SSH disconnect: {}", e);
    }
}
