//! Monitor client over an SSH session

use std::sync::Arc;

use async_trait::async_trait;
use russh::ChannelMsg;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sw_core::config::{AppConfig, ConnectionTarget};
use sw_core::error::{StartError, TransportError};
use sw_core::streams::SessionStreams;
use sw_core::traits::MonitorClient;

use super::connector::{self, SshHandle};
use crate::agent::{self, ExitNotifier};
use crate::scripts::RemoteLayout;

/// Buffer between the SSH channel and the stream readers
const PIPE_CAPACITY: usize = 64 * 1024;

/// Runs the monitor agent as the single exec command of an SSH session
pub struct SshMonitorClient {
    target: Arc<ConnectionTarget>,
    config: Arc<AppConfig>,
    session: Option<SshHandle>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SshMonitorClient {
    pub fn new(target: Arc<ConnectionTarget>, config: Arc<AppConfig>) -> Self {
        Self {
            target,
            config,
            session: None,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }
}

#[async_trait]
impl MonitorClient for SshMonitorClient {
    fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let session = connector::open_session(
            &self.target,
            &self.config.known_hosts_path,
            self.config.connect_timeout,
        )
        .await?;
        self.session = Some(session);
        Ok(())
    }

    async fn start(&mut self) -> Result<SessionStreams, StartError> {
        let session = self.session.as_ref().ok_or(StartError::NotConnected)?;
        let command = RemoteLayout::new(&self.config.install_dir).monitor_command();

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| StartError::Launch(format!("Failed to open session channel: {}", e)))?;
        channel
            .exec(true, command.as_str())
            .await
            .map_err(|e| StartError::Launch(format!("Failed to run {}: {}", command, e)))?;
        tracing::debug!("Started {} on {}", command, self.target.display_name());

        let (stdout_tx, stdout_rx) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_tx, stderr_rx) = tokio::io::duplex(PIPE_CAPACITY);
        let workers = agent::spawn_readers(stdout_rx, stderr_rx, &self.target.display_name());

        self.tasks.extend(workers.tasks);
        self.tasks.push(tokio::spawn(pump_channel(
            channel,
            stdout_tx,
            stderr_tx,
            workers.exit,
            self.shutdown.clone(),
        )));

        agent::await_handshake(workers.signals, self.config.handshake_timeout).await?;
        Ok(workers.streams)
    }

    async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(session) = self.session.take() {
            connector::disconnect(&session).await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Splits channel traffic into the two reader pipes and acts as exit waiter
async fn pump_channel(
    mut channel: russh::Channel<russh::client::Msg>,
    mut stdout: tokio::io::DuplexStream,
    mut stderr: tokio::io::DuplexStream,
    exit: ExitNotifier,
    shutdown: CancellationToken,
) {
    let mut exit_code = None;

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => None,
            msg = channel.wait() => Some(msg),
        };
        let Some(msg) = next else {
            let _ = channel.close().await;
            break;
        };

        match msg {
            Some(ChannelMsg::Data { data }) => {
                if stdout.write_all(&data).await.is_err() {
                    tracing::debug!("Protocol reader gone, discarding output");
                }
            }
            Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                let _ = stderr.write_all(&data).await;
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = Some(exit_status);
            }
            Some(ChannelMsg::Eof) => {
                // Readers see end of stream; keep waiting for the exit status
                let _ = stdout.shutdown().await;
                let _ = stderr.shutdown().await;
            }
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    drop(stdout);
    drop(stderr);
    exit.exited(exit_code);
}
