//! Session orchestrator
//!
//! The `SessionOrchestrator` is the single task that drives the connection
//! state machine. Each state maps to exactly one handler; a handler performs
//! the work for its state, fires exactly one event and returns, and the main
//! loop dispatches on the new state.
//!
//! # Ownership
//!
//! Only the orchestrator task calls [`StateMachine::transition`]. Monitor
//! client workers report through the [`SessionStreams`] they hand back from
//! `start()`, and the user interface reports through [`UiCommand`]s. Both are
//! translated into events here.
//!
//! # Blocking work
//!
//! Connecting and installing run as futures raced against the command inbox
//! and the shutdown token, so a quit is honoured mid-attempt. While installing,
//! commands other than quit are held back and replayed at the next wait point.
//!
//! Every monitor client and installer the orchestrator creates is closed before
//! its handler returns, on every exit path.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sw_core::config::{apply_ssh_config, AppConfig, ConfigStore, ConnectionTarget, SshConfig};
use sw_core::error::{InstallError, InstallStep};
use sw_core::streams::SessionStreams;
use sw_core::traits::{Installer, MonitorClient, TransportFactory};

use crate::classify::{classify_failure, AttemptFailure};
use crate::state::{ConnectionEvent, ConnectionState, StateChange, StateMachine};
use crate::ui::{ErrorKind, UiCommand, UiShell};

/// Capacity of the UI command channel
pub const COMMAND_CAPACITY: usize = 16;

/// Create the channel carrying user commands to the orchestrator
pub fn command_channel() -> (mpsc::Sender<UiCommand>, mpsc::Receiver<UiCommand>) {
    mpsc::channel(COMMAND_CAPACITY)
}

/// External services the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub ui: Arc<dyn UiShell>,
    pub factory: Arc<dyn TransportFactory>,
    pub store: Arc<dyn ConfigStore>,
}

/// User commands plus the one held back during an install
struct CommandInbox {
    rx: mpsc::Receiver<UiCommand>,
    deferred: Option<UiCommand>,
}

impl CommandInbox {
    /// Next command; `None` once the UI side is gone
    async fn recv(&mut self) -> Option<UiCommand> {
        if let Some(command) = self.deferred.take() {
            return Some(command);
        }
        self.rx.recv().await
    }

    /// Next command from the UI, leaving a deferred one in place
    async fn recv_new(&mut self) -> Option<UiCommand> {
        self.rx.recv().await
    }

    /// Hold a command for the next wait point; a newer command replaces an older one
    fn defer(&mut self, command: UiCommand) {
        if let Some(dropped) = self.deferred.replace(command) {
            tracing::debug!("Superseded deferred command {:?}", dropped);
        }
    }
}

/// A started monitor client and its streams
struct ActiveSession {
    client: Box<dyn MonitorClient>,
    streams: SessionStreams,
}

/// What ended a wait that raced user input
enum Interrupt {
    Quit,
    Switch,
}

/// How the connected loop ended
enum SessionEnd {
    Quit,
    Disconnect,
    Switch,
    Failed(String),
    Closed,
}

/// Drives connection setup, agent provisioning and status monitoring
pub struct SessionOrchestrator {
    machine: StateMachine,
    config: Arc<AppConfig>,
    target: Option<Arc<ConnectionTarget>>,
    ui: Arc<dyn UiShell>,
    factory: Arc<dyn TransportFactory>,
    store: Arc<dyn ConfigStore>,
    inbox: CommandInbox,
    shutdown: CancellationToken,
    active: Option<ActiveSession>,
    /// Set after a successful install, cleared by the next connect attempt
    just_installed: bool,
}

impl SessionOrchestrator {
    /// Create an orchestrator in the `Unconfigured` state.
    ///
    /// Cancelling `shutdown` has the same effect as a quit command.
    pub fn new(
        config: AppConfig,
        collaborators: Collaborators,
        commands: mpsc::Receiver<UiCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        let mut machine = StateMachine::new();
        machine.observe(|change| {
            if change.event == ConnectionEvent::StatusUpdate {
                tracing::trace!("Status update");
            } else {
                tracing::info!("{} -> {} ({})", change.from, change.to, change.event);
            }
        });

        Self {
            machine,
            config: Arc::new(config),
            target: None,
            ui: collaborators.ui,
            factory: collaborators.factory,
            store: collaborators.store,
            inbox: CommandInbox {
                rx: commands,
                deferred: None,
            },
            shutdown,
            active: None,
            just_installed: false,
        }
    }

    /// Register an additional transition observer
    pub fn observe(&mut self, observer: impl FnMut(&StateChange) + Send + 'static) {
        self.machine.observe(observer);
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.current()
    }

    /// Run until the user quits or `shutdown` is cancelled. Returns the final state.
    pub async fn run(mut self) -> ConnectionState {
        self.load_initial_target();

        loop {
            match self.machine.current() {
                ConnectionState::Unconfigured
                | ConnectionState::Disconnected
                | ConnectionState::Error => self.await_selection().await,
                ConnectionState::Connecting => self.connect().await,
                ConnectionState::Installing => self.install(false).await,
                ConnectionState::Reinstalling => self.install(true).await,
                ConnectionState::Connected => self.monitor().await,
                ConnectionState::Quitting => break,
            }
        }

        if let Some(mut active) = self.active.take() {
            active.client.close().await;
        }
        tracing::info!("Orchestrator stopped");
        self.machine.current()
    }

    fn ssh_config(&self) -> SshConfig {
        SshConfig::load(&self.config.ssh_config_path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring ssh config: {}", e);
            SshConfig::default()
        })
    }

    fn offer_hosts(&self) {
        self.ui.show_server_selection(&self.ssh_config().hosts());
    }

    /// Start connecting to the configured target, or ask the user for one
    fn load_initial_target(&mut self) {
        let Some(configured) = self.config.target.clone() else {
            tracing::info!("No target configured");
            self.offer_hosts();
            return;
        };

        let resolved = apply_ssh_config(&configured, &self.ssh_config());
        match resolved.validate() {
            Ok(()) => {
                self.target = Some(Arc::new(resolved));
                self.machine.transition(ConnectionEvent::ConfigLoaded);
            }
            Err(e) => {
                tracing::warn!("Configured target unusable: {}", e);
                self.ui.show_error(ErrorKind::Config, &e.to_string());
                self.offer_hosts();
            }
        }
    }

    /// Resolve, persist and adopt a user selection.
    ///
    /// Returns `false` (after telling the user) when the selection cannot be
    /// used or saved; the previous configuration stays in effect.
    fn select_target(&mut self, selected: ConnectionTarget) -> bool {
        let resolved = apply_ssh_config(&selected, &self.ssh_config());
        if let Err(e) = resolved.validate() {
            self.ui.show_error(
                ErrorKind::Config,
                &format!("Cannot use {}: {}", selected.display_name(), e),
            );
            return false;
        }

        let next = self.config.with_target(selected);
        if let Err(e) = self.store.save(&next) {
            tracing::error!("Failed to save configuration: {}", e);
            self.ui.show_error(
                ErrorKind::Config,
                &format!("Failed to save configuration to {}: {}", self.store.location(), e),
            );
            return false;
        }

        tracing::info!("Selected {}", resolved.display_name());
        self.config = Arc::new(next);
        self.target = Some(Arc::new(resolved));
        self.just_installed = false;
        true
    }

    /// Idle states: wait for a selection or quit
    async fn await_selection(&mut self) {
        loop {
            let command = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                command = self.inbox.recv() => command,
            };

            match command {
                None | Some(UiCommand::Quit) => {
                    self.machine.transition(ConnectionEvent::UserQuit);
                    return;
                }
                Some(UiCommand::ServerSelected(target)) => {
                    if self.select_target(target) {
                        self.machine.transition(ConnectionEvent::ServerSelected);
                        return;
                    }
                }
                Some(UiCommand::Disconnect) => tracing::debug!("Not connected, ignoring disconnect"),
            }
        }
    }

    /// Connecting: dial, start the agent and complete the handshake
    async fn connect(&mut self) {
        let Some(target) = self.target.clone() else {
            self.ui.show_error(ErrorKind::Connection, "No server selected");
            self.machine.transition(ConnectionEvent::ConnectFailed);
            return;
        };

        self.ui.show_connecting(&target);
        let mut client = self.factory.monitor_client(target.clone(), self.config.clone());

        let outcome = {
            let attempt = async {
                client.connect().await?;
                Ok::<_, AttemptFailure>(client.start().await?)
            };
            tokio::pin!(attempt);

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break Err(Interrupt::Quit),
                    command = self.inbox.recv() => match command {
                        None | Some(UiCommand::Quit) => break Err(Interrupt::Quit),
                        Some(UiCommand::ServerSelected(next)) => {
                            if self.select_target(next) {
                                break Err(Interrupt::Switch);
                            }
                        }
                        Some(UiCommand::Disconnect) => {
                            tracing::debug!("Ignoring disconnect while connecting")
                        }
                    },
                    result = &mut attempt => break Ok(result),
                }
            }
        };

        match outcome {
            Ok(Ok(streams)) => {
                self.just_installed = false;
                self.active = Some(ActiveSession { client, streams });
                self.machine.transition(ConnectionEvent::ConnectSuccess);
                self.ui.show_connected(&target);
            }
            Ok(Err(failure)) => {
                client.close().await;
                let (event, message) = self.failure_event(&failure);
                tracing::warn!("Connecting to {} failed: {}", target.display_name(), failure);
                if event == ConnectionEvent::ConnectFailed {
                    self.ui.show_error(ErrorKind::Connection, &message);
                }
                self.machine.transition(event);
            }
            Err(Interrupt::Quit) => {
                client.close().await;
                self.machine.transition(ConnectionEvent::UserQuit);
            }
            Err(Interrupt::Switch) => {
                client.close().await;
                self.machine.transition(ConnectionEvent::SwitchServer);
            }
        }
    }

    /// Classify a failure, refusing to loop back into install right after one
    fn failure_event(&mut self, failure: &AttemptFailure) -> (ConnectionEvent, String) {
        let event = classify_failure(failure);
        let after_install = std::mem::take(&mut self.just_installed);

        let wants_install = matches!(
            event,
            ConnectionEvent::NotConfigured | ConnectionEvent::VersionMismatch
        );
        if after_install && wants_install {
            return (
                ConnectionEvent::ConnectFailed,
                format!("Monitor agent still unusable after install: {}", failure),
            );
        }
        (event, failure.to_string())
    }

    /// Installing or Reinstalling: provision the agent
    async fn install(&mut self, reinstall: bool) {
        let Some(target) = self.target.clone() else {
            self.ui.show_error(ErrorKind::Install, "No server selected");
            self.machine.transition(ConnectionEvent::InstallFailed);
            return;
        };

        self.ui.show_installing(&target, reinstall);
        let mut installer = self.factory.installer(target.clone(), self.config.clone());

        let outcome = {
            let work = provision(installer.as_mut(), reinstall);
            tokio::pin!(work);

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break None,
                    command = self.inbox.recv_new() => match command {
                        None | Some(UiCommand::Quit) => break None,
                        Some(other) => self.inbox.defer(other),
                    },
                    result = &mut work => break Some(result),
                }
            }
        };
        installer.close().await;

        match outcome {
            Some(Ok(())) => {
                tracing::info!("Monitor agent installed on {}", target.display_name());
                self.just_installed = true;
                self.machine.transition(ConnectionEvent::InstallSuccess);
            }
            Some(Err(e)) => {
                tracing::error!("Install on {} failed: {}", target.display_name(), e);
                self.ui.show_error(ErrorKind::Install, &e.to_string());
                self.machine.transition(ConnectionEvent::InstallFailed);
            }
            None => {
                self.machine.transition(ConnectionEvent::UserQuit);
            }
        }
    }

    /// Connected: forward status, watch for errors, end of session and commands
    async fn monitor(&mut self) {
        let Some(mut active) = self.active.take() else {
            self.ui.show_error(ErrorKind::Session, "No active session");
            self.machine.transition(ConnectionEvent::SessionClosed);
            return;
        };

        let mut errors_open = true;
        let mut status_open = true;

        let end = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break SessionEnd::Quit,
                error = active.streams.errors.recv(), if errors_open => match error {
                    Some(e) => break SessionEnd::Failed(e.to_string()),
                    None => errors_open = false,
                },
                batch = active.streams.status.recv(), if status_open => match batch {
                    Some(batch) => {
                        self.ui.show_statuses(&batch);
                        self.machine.transition(ConnectionEvent::StatusUpdate);
                    }
                    None => status_open = false,
                },
                _ = active.streams.done.cancelled() => break SessionEnd::Closed,
                command = self.inbox.recv() => match command {
                    None | Some(UiCommand::Quit) => break SessionEnd::Quit,
                    Some(UiCommand::Disconnect) => break SessionEnd::Disconnect,
                    Some(UiCommand::ServerSelected(next)) => {
                        if self.select_target(next) {
                            break SessionEnd::Switch;
                        }
                    }
                },
            }
        };
        active.client.close().await;

        match end {
            SessionEnd::Quit => {
                self.machine.transition(ConnectionEvent::UserQuit);
            }
            SessionEnd::Disconnect => {
                self.machine.transition(ConnectionEvent::UserDisconnect);
                self.ui.show_disconnected();
            }
            SessionEnd::Switch => {
                self.machine.transition(ConnectionEvent::SwitchServer);
            }
            SessionEnd::Failed(message) => {
                tracing::warn!("Session error: {}", message);
                self.ui.show_error(ErrorKind::Session, &message);
                self.machine.transition(ConnectionEvent::SessionError);
            }
            SessionEnd::Closed => {
                let name = active.client.target().display_name();
                tracing::warn!("Session with {} closed", name);
                self.ui
                    .show_error(ErrorKind::Session, &format!("Connection to {} closed", name));
                self.machine.transition(ConnectionEvent::SessionClosed);
            }
        }
    }
}

/// Connect, check tools (first install only) and install
async fn provision(installer: &mut dyn Installer, reinstall: bool) -> Result<(), InstallError> {
    installer
        .connect()
        .await
        .map_err(|e| InstallError::step(InstallStep::Connect, e.to_string()))?;
    if !reinstall {
        let (ok, message) = installer.check_dependencies().await;
        if !ok {
            return Err(InstallError::MissingDependencies(message));
        }
    }
    installer.install().await
}
