//! Core error types for sesswatch
//!
//! Collaborators (monitor clients, installers, the config store) return
//! these typed errors. Only the orchestrator turns them into state machine
//! events.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Dial and authentication failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// Private key file missing or unreadable
    #[error("Private key not found at {path}: {message}")]
    KeyNotFound { path: PathBuf, message: String },

    /// Dial did not complete in time
    #[error("Connection to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    /// TCP/SSH level connection failure
    #[error("Failed to connect to {address}: {message}")]
    Dial { address: String, message: String },

    /// Public key authentication was rejected
    #[error("Authentication rejected for user '{user}'")]
    AuthRejected { user: String },

    /// The host presented a different key than the one on record
    #[error(
        "Host key for {host} does not match the key recorded at known_hosts line {line}; refusing to connect (possible interception)"
    )]
    HostKeyChanged { host: String, line: usize },

    /// The trust store could not be read or updated
    #[error("Host key store error: {0}")]
    HostKeyStore(String),

    /// The local virtualization subsystem is not usable
    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    /// Any other SSH protocol failure
    #[error("SSH error: {0}")]
    Ssh(String),
}

/// Failures while launching the monitor agent or during the handshake
#[derive(Error, Debug)]
pub enum StartError {
    /// `start()` was called without a successful `connect()`
    #[error("Not connected")]
    NotConnected,

    /// The agent command could not be launched
    #[error("Failed to launch monitor agent: {0}")]
    Launch(String),

    /// The agent exited before completing the handshake
    #[error("Monitor agent exited before handshake (exit code {}): {detail}", .code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    EarlyExit { code: Option<u32>, detail: String },

    /// The first frame was not a version frame with our exact version
    #[error("Protocol version mismatch: expected {expected}, agent reported {}", .found.as_deref().unwrap_or("no version frame"))]
    VersionMismatch {
        expected: String,
        found: Option<String>,
    },

    /// No frame arrived within the handshake bound
    #[error("No handshake from monitor agent within {0:?}")]
    HandshakeTimeout(Duration),
}

impl StartError {
    /// Whether this failure means the agent is stale or mismatched.
    ///
    /// A silent pre-handshake agent is treated the same as a deliberately
    /// mismatched one.
    pub fn is_version_problem(&self) -> bool {
        matches!(
            self,
            StartError::VersionMismatch { .. } | StartError::HandshakeTimeout(_)
        )
    }
}

/// Failures during an active, handshaken session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The agent emitted an `error` frame
    #[error("{0}")]
    Remote(String),

    /// Reading the protocol stream failed
    #[error("Failed to read agent output: {0}")]
    Stream(String),
}

/// Individual provisioning steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    Connect,
    CreateDirectories,
    WriteScripts,
    SetPermissions,
    ConfigureHooks,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallStep::Connect => "connect",
            InstallStep::CreateDirectories => "create directories",
            InstallStep::WriteScripts => "write scripts",
            InstallStep::SetPermissions => "set permissions",
            InstallStep::ConfigureHooks => "configure hooks",
        };
        f.write_str(name)
    }
}

/// Provisioning failures
#[derive(Error, Debug)]
pub enum InstallError {
    /// Required tools are missing on the target
    #[error("{0}")]
    MissingDependencies(String),

    /// A step of the install sequence failed
    #[error("Install step '{step}' failed: {message}")]
    StepFailed { step: InstallStep, message: String },
}

impl InstallError {
    /// Construct a step failure
    pub fn step(step: InstallStep, message: impl Into<String>) -> Self {
        InstallError::StepFailed {
            step,
            message: message.into(),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
