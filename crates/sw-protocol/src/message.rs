//! Frame types for the sesswatch status protocol
//!
//! The monitor agent writes one JSON object per line on its standard output.
//! Every object carries a `type` tag selecting one of three shapes:
//!
//! ```text
//! {"type":"version","version":"1.2.0"}
//! {"type":"status","data":[{"project":"...","project_name":"...","session_id":"...","status":"idle","updated_at":1700000000}]}
//! {"type":"error","message":"..."}
//! ```
//!
//! # Message Flow
//!
//! 1. The agent starts and immediately emits a `version` frame (handshake)
//! 2. The agent emits a `status` frame with the full set of active sessions
//!    whenever anything changes. Each one replaces the previous snapshot.
//! 3. Agent problems are reported with `error` frames. The agent may keep
//!    writing, but the client treats the frame as a session error and ends
//!    the session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;
use crate::status::SessionStatus;

/// Protocol version spoken by this build.
///
/// The agent scripts are generated with this value substituted in, and the
/// handshake compares the agent's reported version with exact string
/// equality. Bump it whenever the agent scripts, hook registration or frame
/// shapes change.
pub const PROTOCOL_VERSION: &str = "1.2.0";

/// A single protocol frame (one line on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Handshake: the agent's protocol version
    Version { version: String },
    /// Full snapshot of active sessions
    Status {
        #[serde(default)]
        data: Vec<SessionStatus>,
    },
    /// One-line error notification; the client ends the session on it
    Error { message: String },
}

/// Frame discriminant, mostly useful for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Version,
    Status,
    Error,
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Version => write!(f, "version"),
            FrameType::Status => write!(f, "status"),
            FrameType::Error => write!(f, "error"),
        }
    }
}

impl Frame {
    /// Parse a single line (without the trailing newline)
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Serialize to a single line, without the trailing newline
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Get the frame type
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Version { .. } => FrameType::Version,
            Frame::Status { .. } => FrameType::Status,
            Frame::Error { .. } => FrameType::Error,
        }
    }

    /// Convenience constructor for the handshake frame of this build
    pub fn current_version() -> Self {
        Frame::Version {
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}
