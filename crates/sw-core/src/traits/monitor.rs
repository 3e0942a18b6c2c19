//! Monitor client traits

use async_trait::async_trait;
use std::sync::Arc;

use super::Installer;
use crate::config::{AppConfig, ConnectionTarget};
use crate::error::{StartError, TransportError};
use crate::streams::SessionStreams;

/// One connection to a monitor agent.
///
/// Instances are single-use: created for one connection attempt and dropped
/// after it ends.
#[async_trait]
pub trait MonitorClient: Send {
    /// Target this client was created for
    fn target(&self) -> &ConnectionTarget;

    /// Reach the target and authenticate
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Launch the agent and complete the version handshake.
    ///
    /// On success the returned streams carry status batches, session errors
    /// and the completion signal for the rest of the session.
    async fn start(&mut self) -> Result<SessionStreams, StartError>;

    /// Terminate the agent and the underlying session.
    ///
    /// Safe to call more than once and after a failed `connect()`.
    async fn close(&mut self);
}

/// Builds the transport-appropriate client or installer for a target
pub trait TransportFactory: Send + Sync {
    /// Create a monitor client for `target`
    fn monitor_client(
        &self,
        target: Arc<ConnectionTarget>,
        config: Arc<AppConfig>,
    ) -> Box<dyn MonitorClient>;

    /// Create an installer for `target`
    fn installer(&self, target: Arc<ConnectionTarget>, config: Arc<AppConfig>)
        -> Box<dyn Installer>;
}
