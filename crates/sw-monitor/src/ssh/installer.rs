//! Agent installer over SSH

use std::sync::Arc;

use async_trait::async_trait;
use russh::ChannelMsg;

use sw_core::config::{AppConfig, ConnectionTarget};
use sw_core::error::{InstallError, TransportError};
use sw_core::traits::Installer;

use super::connector::{self, SshHandle};
use crate::install::{self, CommandOutput, RemoteExec};
use crate::scripts::{AgentScripts, RemoteLayout};

/// Installs the agent through one exec channel per command
pub struct SshInstaller {
    target: Arc<ConnectionTarget>,
    config: Arc<AppConfig>,
    session: Option<SshHandle>,
}

impl SshInstaller {
    pub fn new(target: Arc<ConnectionTarget>, config: Arc<AppConfig>) -> Self {
        Self {
            target,
            config,
            session: None,
        }
    }
}

#[async_trait]
impl RemoteExec for SshInstaller {
    async fn exec(&mut self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, String> {
        let session = self.session.as_ref().ok_or("not connected")?;

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| format!("failed to open channel: {}", e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| format!("failed to run command: {}", e))?;

        if let Some(input) = stdin {
            channel
                .data(input)
                .await
                .map_err(|e| format!("failed to send input: {}", e))?;
        }
        channel
            .eof()
            .await
            .map_err(|e| format!("failed to close input: {}", e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Installer for SshInstaller {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = connector::open_session(
            &self.target,
            &self.config.known_hosts_path,
            self.config.connect_timeout,
        )
        .await?;
        self.session = Some(session);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            connector::disconnect(&session).await;
        }
    }

    async fn check_dependencies(&mut self) -> (bool, String) {
        install::check_dependencies(self, false).await
    }

    async fn install(&mut self) -> Result<(), InstallError> {
        let layout = RemoteLayout::new(&self.config.install_dir);
        install::run_install(self, &layout, &AgentScripts::current()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_fail_before_connect() {
        let mut installer = SshInstaller::new(
            Arc::new(ConnectionTarget::remote("a", "192.0.2.1")),
            Arc::new(AppConfig::default()),
        );

        let (ok, message) = installer.check_dependencies().await;
        assert!(!ok);
        assert!(message.contains("not connected"));

        let err = installer.install().await.unwrap_err();
        assert!(err.to_string().contains("create directories"));

        // Closing an installer that never connected is harmless
        installer.close().await;
        installer.close().await;
    }
}
