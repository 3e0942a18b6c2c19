//! Connection state machine
//!
//! The machine only knows the transition table. It performs no IO and owns no
//! resources; the orchestrator decides which events to fire.

use std::fmt;

/// Application connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No target configured, waiting for the user to pick one
    Unconfigured,
    Connecting,
    /// First-time agent install
    Installing,
    /// Agent update after a version mismatch
    Reinstalling,
    Connected,
    /// The user disconnected
    Disconnected,
    Error,
    Quitting,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 8] = [
        ConnectionState::Unconfigured,
        ConnectionState::Connecting,
        ConnectionState::Installing,
        ConnectionState::Reinstalling,
        ConnectionState::Connected,
        ConnectionState::Disconnected,
        ConnectionState::Error,
        ConnectionState::Quitting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Unconfigured => "Unconfigured",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Installing => "Installing",
            ConnectionState::Reinstalling => "Reinstalling",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Error => "Error",
            ConnectionState::Quitting => "Quitting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    ConfigLoaded,
    ServerSelected,
    ConnectSuccess,
    ConnectFailed,
    VersionMismatch,
    NotConfigured,
    InstallSuccess,
    InstallFailed,
    SessionError,
    SessionClosed,
    StatusUpdate,
    UserDisconnect,
    /// User quit or termination signal
    UserQuit,
    SwitchServer,
}

impl ConnectionEvent {
    pub const ALL: [ConnectionEvent; 14] = [
        ConnectionEvent::ConfigLoaded,
        ConnectionEvent::ServerSelected,
        ConnectionEvent::ConnectSuccess,
        ConnectionEvent::ConnectFailed,
        ConnectionEvent::VersionMismatch,
        ConnectionEvent::NotConfigured,
        ConnectionEvent::InstallSuccess,
        ConnectionEvent::InstallFailed,
        ConnectionEvent::SessionError,
        ConnectionEvent::SessionClosed,
        ConnectionEvent::StatusUpdate,
        ConnectionEvent::UserDisconnect,
        ConnectionEvent::UserQuit,
        ConnectionEvent::SwitchServer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionEvent::ConfigLoaded => "ConfigLoaded",
            ConnectionEvent::ServerSelected => "ServerSelected",
            ConnectionEvent::ConnectSuccess => "ConnectSuccess",
            ConnectionEvent::ConnectFailed => "ConnectFailed",
            ConnectionEvent::VersionMismatch => "VersionMismatch",
            ConnectionEvent::NotConfigured => "NotConfigured",
            ConnectionEvent::InstallSuccess => "InstallSuccess",
            ConnectionEvent::InstallFailed => "InstallFailed",
            ConnectionEvent::SessionError => "SessionError",
            ConnectionEvent::SessionClosed => "SessionClosed",
            ConnectionEvent::StatusUpdate => "StatusUpdate",
            ConnectionEvent::UserDisconnect => "UserDisconnect",
            ConnectionEvent::UserQuit => "UserQuit",
            ConnectionEvent::SwitchServer => "SwitchServer",
        }
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of firing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: ConnectionState,
    /// Equal to `from` when the transition was rejected
    pub to: ConnectionState,
    pub event: ConnectionEvent,
    pub valid: bool,
}

struct TransitionRule {
    from: ConnectionState,
    on: ConnectionEvent,
    to: ConnectionState,
}

const fn rule(from: ConnectionState, on: ConnectionEvent, to: ConnectionState) -> TransitionRule {
    TransitionRule { from, on, to }
}

use ConnectionEvent as E;
use ConnectionState as S;

/// The complete transition table; any pair not listed is rejected
const TRANSITION_RULES: &[TransitionRule] = &[
    rule(S::Unconfigured, E::ConfigLoaded, S::Connecting),
    rule(S::Unconfigured, E::ServerSelected, S::Connecting),
    rule(S::Unconfigured, E::UserQuit, S::Quitting),
    rule(S::Connecting, E::ConnectSuccess, S::Connected),
    rule(S::Connecting, E::ConnectFailed, S::Error),
    rule(S::Connecting, E::VersionMismatch, S::Reinstalling),
    rule(S::Connecting, E::NotConfigured, S::Installing),
    rule(S::Connecting, E::SwitchServer, S::Connecting),
    rule(S::Connecting, E::UserQuit, S::Quitting),
    rule(S::Installing, E::InstallSuccess, S::Connecting),
    rule(S::Installing, E::InstallFailed, S::Error),
    rule(S::Installing, E::UserQuit, S::Quitting),
    rule(S::Reinstalling, E::InstallSuccess, S::Connecting),
    rule(S::Reinstalling, E::InstallFailed, S::Error),
    rule(S::Reinstalling, E::UserQuit, S::Quitting),
    rule(S::Connected, E::StatusUpdate, S::Connected),
    rule(S::Connected, E::SessionError, S::Error),
    rule(S::Connected, E::SessionClosed, S::Error),
    rule(S::Connected, E::UserDisconnect, S::Disconnected),
    rule(S::Connected, E::SwitchServer, S::Connecting),
    rule(S::Connected, E::UserQuit, S::Quitting),
    rule(S::Disconnected, E::ServerSelected, S::Connecting),
    rule(S::Disconnected, E::UserQuit, S::Quitting),
    rule(S::Error, E::ServerSelected, S::Connecting),
    rule(S::Error, E::UserQuit, S::Quitting),
];

/// Look up the target state for `on` fired in `from`
pub fn next_state(from: ConnectionState, on: ConnectionEvent) -> Option<ConnectionState> {
    TRANSITION_RULES
        .iter()
        .find(|r| r.from == from && r.on == on)
        .map(|r| r.to)
}

/// Callback run after every accepted transition
pub type TransitionObserver = Box<dyn FnMut(&StateChange) + Send>;

/// Table-driven state machine
pub struct StateMachine {
    current: ConnectionState,
    observers: Vec<TransitionObserver>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::starting_at(ConnectionState::Unconfigured)
    }

    pub fn starting_at(initial: ConnectionState) -> Self {
        Self {
            current: initial,
            observers: Vec::new(),
        }
    }

    pub fn current(&self) -> ConnectionState {
        self.current
    }

    /// Register a callback for accepted transitions, in registration order
    pub fn observe(&mut self, observer: impl FnMut(&StateChange) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Fire `event`. Rejected events leave the state unchanged and notify no one.
    pub fn transition(&mut self, event: ConnectionEvent) -> StateChange {
        let from = self.current;

        let Some(to) = next_state(from, event) else {
            tracing::warn!("Invalid transition: {} + {}", from, event);
            return StateChange {
                from,
                to: from,
                event,
                valid: false,
            };
        };

        self.current = to;
        let change = StateChange {
            from,
            to,
            event,
            valid: true,
        };
        tracing::debug!("State: {} --{}--> {}", from, event, to);

        for observer in &mut self.observers {
            observer(&change);
        }
        change
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("observers", &self.observers.len())
            .finish()
    }
}
