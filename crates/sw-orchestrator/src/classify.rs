//! Mapping of connection attempt failures to state machine events

use std::fmt;

use sw_core::error::{StartError, TransportError};

use crate::state::ConnectionEvent;

/// Output fragments that mean the agent script is not installed or not runnable
const AGENT_MISSING_SIGNATURES: &[&str] = &[
    "no such file or directory",
    "not found",
    "permission denied",
    "monitor.sh",
];

/// Shell exit codes for "cannot execute" and "command not found"
const AGENT_MISSING_EXIT_CODES: &[u32] = &[126, 127];

/// Why a connect-and-start attempt failed
#[derive(Debug)]
pub enum AttemptFailure {
    Transport(TransportError),
    Start(StartError),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Transport(e) => write!(f, "{}", e),
            AttemptFailure::Start(e) => write!(f, "{}", e),
        }
    }
}

impl From<TransportError> for AttemptFailure {
    fn from(e: TransportError) -> Self {
        AttemptFailure::Transport(e)
    }
}

impl From<StartError> for AttemptFailure {
    fn from(e: StartError) -> Self {
        AttemptFailure::Start(e)
    }
}

/// Whether agent output indicates a missing or non-executable agent
pub fn looks_like_missing_agent(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    AGENT_MISSING_SIGNATURES.iter().any(|s| detail.contains(s))
}

/// Choose the event for a failed attempt.
///
/// - dial and authentication failures: `ConnectFailed`
/// - an agent that exits early complaining it cannot be found or run:
///   `NotConfigured`
/// - a wrong version, a silent agent, or any other early exit: `VersionMismatch`
/// - launch failures of the session itself: `ConnectFailed`
pub fn classify_failure(failure: &AttemptFailure) -> ConnectionEvent {
    match failure {
        AttemptFailure::Transport(_) => ConnectionEvent::ConnectFailed,
        AttemptFailure::Start(StartError::EarlyExit { code, detail }) => {
            let missing_code = code.is_some_and(|c| AGENT_MISSING_EXIT_CODES.contains(&c));
            if missing_code || looks_like_missing_agent(detail) {
                ConnectionEvent::NotConfigured
            } else {
                ConnectionEvent::VersionMismatch
            }
        }
        AttemptFailure::Start(e) if e.is_version_problem() => ConnectionEvent::VersionMismatch,
        AttemptFailure::Start(_) => ConnectionEvent::ConnectFailed,
    }
}
