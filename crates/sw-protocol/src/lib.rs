//! sw-protocol: Status protocol for sesswatch
//!
//! This crate defines the newline-delimited JSON protocol emitted by the
//! monitor agent on its standard output, and the tokio codec used to read
//! it from any byte stream (SSH channel or local process pipe).

pub mod codec;
pub mod error;
pub mod message;
pub mod status;

pub use codec::{FrameCodec, MAX_LINE_LENGTH};
pub use error::ProtocolError;
pub use message::{Frame, FrameType, PROTOCOL_VERSION};
pub use status::{SessionState, SessionStatus};
