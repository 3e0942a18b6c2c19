//! Transport selection

use std::sync::Arc;

use sw_core::config::{AppConfig, ConnectionTarget};
use sw_core::traits::{Installer, MonitorClient, TransportFactory};
use sw_core::types::TransportKind;

use crate::sandbox::{SandboxInstaller, SandboxMonitorClient};
use crate::ssh::{SshInstaller, SshMonitorClient};

/// Picks the SSH or sandbox implementation from the target
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn monitor_client(
        &self,
        target: Arc<ConnectionTarget>,
        config: Arc<AppConfig>,
    ) -> Box<dyn MonitorClient> {
        match target.transport() {
            TransportKind::RemoteShell => Box::new(SshMonitorClient::new(target, config)),
            TransportKind::LocalSandbox => Box::new(SandboxMonitorClient::new(target, config)),
        }
    }

    fn installer(
        &self,
        target: Arc<ConnectionTarget>,
        config: Arc<AppConfig>,
    ) -> Box<dyn Installer> {
        match target.transport() {
            TransportKind::RemoteShell => Box::new(SshInstaller::new(target, config)),
            TransportKind::LocalSandbox => Box::new(SandboxInstaller::new(target, config)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_follows_target() {
        let factory = DefaultTransportFactory;
        let config = Arc::new(AppConfig::default());

        let remote = factory.monitor_client(
            Arc::new(ConnectionTarget::remote("dev", "dev.lan")),
            config.clone(),
        );
        assert_eq!(remote.target().transport(), TransportKind::RemoteShell);

        let sandbox = factory.monitor_client(Arc::new(ConnectionTarget::sandbox("")), config);
        assert_eq!(sandbox.target().display_name(), "Sandbox");
    }
}
