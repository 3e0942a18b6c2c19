//! Agent installer trait

use async_trait::async_trait;

use crate::error::{InstallError, TransportError};

/// Provisions or upgrades the monitor agent on a target
#[async_trait]
pub trait Installer: Send {
    /// Reach the target (no-op for local transports)
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Release the connection; idempotent
    async fn close(&mut self);

    /// Probe for the external tools the agent needs.
    ///
    /// Returns `false` with a message naming exactly the missing tools.
    async fn check_dependencies(&mut self) -> (bool, String);

    /// Create directories, write both scripts, mark them executable and
    /// register the hooks, stopping at the first failing step.
    async fn install(&mut self) -> Result<(), InstallError>;
}
