//! sw-orchestrator: Connection lifecycle for sesswatch
//!
//! A table-driven state machine plus the orchestrator task that owns it. The
//! orchestrator creates monitor clients and installers through a
//! [`TransportFactory`](sw_core::traits::TransportFactory), classifies their
//! failures into state machine events and drives a [`UiShell`].

pub mod classify;
pub mod session;
pub mod state;
pub mod ui;

pub use classify::{classify_failure, AttemptFailure};
pub use session::{command_channel, Collaborators, SessionOrchestrator};
pub use state::{ConnectionEvent, ConnectionState, StateChange, StateMachine};
pub use ui::{ErrorKind, UiCommand, UiShell};
