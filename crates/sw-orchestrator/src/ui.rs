//! Presentation seam between the orchestrator and a user interface

use std::fmt;

use sw_core::config::{ConnectionTarget, SshHost};
use sw_protocol::SessionStatus;

/// Which part of the application an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dialing or starting the agent
    Connection,
    /// An established session failed or ended
    Session,
    /// Provisioning the agent
    Install,
    /// Loading or saving configuration
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Connection => "Connection failed",
            ErrorKind::Session => "Session error",
            ErrorKind::Install => "Install failed",
            ErrorKind::Config => "Configuration error",
        };
        f.write_str(label)
    }
}

/// Display operations the orchestrator drives.
///
/// Implementations must not block; they are called from the orchestrator's
/// task.
pub trait UiShell: Send + Sync {
    fn show_connecting(&self, target: &ConnectionTarget);

    /// The agent is being installed (`reinstall == false`) or updated
    fn show_installing(&self, target: &ConnectionTarget, reinstall: bool);

    fn show_connected(&self, target: &ConnectionTarget);

    fn show_disconnected(&self);

    fn show_error(&self, kind: ErrorKind, message: &str);

    /// Replace the displayed sessions with a new snapshot
    fn show_statuses(&self, statuses: &[SessionStatus]);

    /// Ask the user to pick a target from the discovered hosts
    fn show_server_selection(&self, hosts: &[SshHost]);
}

/// User intents delivered to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    ServerSelected(ConnectionTarget),
    Disconnect,
    Quit,
}
