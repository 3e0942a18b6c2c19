//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A line could not be parsed as a protocol frame
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Line exceeded the maximum accepted length
    #[error("Line too long: exceeds maximum of {max} bytes")]
    LineTooLong { max: usize },

    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
