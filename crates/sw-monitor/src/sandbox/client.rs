//! Monitor client running the agent inside the local sandbox

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sw_core::config::{AppConfig, ConnectionTarget};
use sw_core::error::{StartError, TransportError};
use sw_core::streams::SessionStreams;
use sw_core::traits::MonitorClient;

use super::command::{decode_output, SandboxCommand};
use crate::agent::{self, ExitNotifier};
use crate::scripts::RemoteLayout;

/// How long `close()` waits for the agent to be reaped
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Runs the monitor agent as a child process of the sandbox executable
pub struct SandboxMonitorClient {
    target: Arc<ConnectionTarget>,
    config: Arc<AppConfig>,
    command: SandboxCommand,
    connected: bool,
    shutdown: CancellationToken,
    waiter: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SandboxMonitorClient {
    pub fn new(target: Arc<ConnectionTarget>, config: Arc<AppConfig>) -> Self {
        let command = SandboxCommand::new(
            config.sandbox_command.clone(),
            target.sandbox.as_deref().unwrap_or_default(),
        );
        Self {
            target,
            config,
            command,
            connected: false,
            shutdown: CancellationToken::new(),
            waiter: None,
            tasks: Vec::new(),
        }
    }
}

/// Check that the sandbox executable runs and reports a healthy status
pub(crate) async fn probe_sandbox(
    command: &SandboxCommand,
    timeout: Duration,
) -> Result<(), TransportError> {
    let output = tokio::time::timeout(timeout, command.status().output())
        .await
        .map_err(|_| TransportError::Timeout {
            address: command.program().to_string(),
            timeout,
        })?
        .map_err(|e| {
            TransportError::SandboxUnavailable(format!("cannot run '{}': {}", command.program(), e))
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let mut detail = decode_output(&output.stderr);
        if detail.trim().is_empty() {
            detail = decode_output(&output.stdout);
        }
        Err(TransportError::SandboxUnavailable(format!(
            "'{} --status' failed ({}): {}",
            command.program(),
            output.status,
            detail.trim()
        )))
    }
}

#[async_trait]
impl MonitorClient for SandboxMonitorClient {
    fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        probe_sandbox(&self.command, self.config.connect_timeout).await?;
        tracing::debug!("Sandbox '{}' is available", self.command.program());
        self.connected = true;
        Ok(())
    }

    async fn start(&mut self) -> Result<SessionStreams, StartError> {
        if !self.connected {
            return Err(StartError::NotConnected);
        }

        let script = RemoteLayout::new(&self.config.install_dir).monitor_command();
        let mut child = self
            .command
            .bash(&script)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| StartError::Launch(format!("{}: {}", self.command.program(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StartError::Launch("agent stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StartError::Launch("agent stderr unavailable".to_string()))?;
        tracing::debug!("Started monitor agent (pid {:?})", child.id());

        let workers = agent::spawn_readers(stdout, stderr, &self.target.display_name());
        self.tasks.extend(workers.tasks);
        self.waiter = Some(tokio::spawn(wait_for_exit(
            child,
            workers.exit,
            self.shutdown.clone(),
        )));

        agent::await_handshake(workers.signals, self.config.handshake_timeout).await?;
        Ok(workers.streams)
    }

    async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(waiter) = self.waiter.take() {
            if tokio::time::timeout(CLOSE_GRACE, waiter).await.is_err() {
                tracing::warn!("Monitor agent did not exit within {:?}", CLOSE_GRACE);
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.connected = false;
    }
}

async fn wait_for_exit(mut child: Child, exit: ExitNotifier, shutdown: CancellationToken) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = shutdown.cancelled() => None,
    };
    let status = match exited {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                tracing::debug!("Failed to kill monitor agent: {}", e);
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => status.code().map(|c| c as u32),
        Err(e) => {
            tracing::warn!("Failed to wait for monitor agent: {}", e);
            None
        }
    };
    exit.exited(code);
}
