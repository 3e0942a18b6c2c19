//! Tokio codec for newline-delimited protocol frames
//!
//! Wraps [`LinesCodec`] and parses each line as a [`Frame`]. Malformed lines
//! (invalid JSON, unknown frame type, oversized lines) are logged and
//! skipped rather than returned as errors: a `FramedRead` stops yielding
//! after the first decoder error, and one bad line must not end the session.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::ProtocolError;
use crate::message::Frame;

/// Maximum accepted line length in bytes.
///
/// A status snapshot with a few hundred sessions stays well below this.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Codec for decoding/encoding protocol frames
#[derive(Debug)]
pub struct FrameCodec {
    lines: LinesCodec,
    max_length: usize,
    /// Number of lines dropped because they could not be parsed
    dropped: u64,
}

impl FrameCodec {
    /// Create a new codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a new codec with a custom line limit
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
            dropped: 0,
        }
    }

    /// Number of malformed lines skipped so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn parse_line(&mut self, line: &str) -> Option<Frame> {
        if line.trim().is_empty() {
            return None;
        }
        match Frame::parse(line) {
            Ok(frame) => Some(frame),
            Err(e) => {
                self.dropped += 1;
                tracing::warn!("Dropping malformed frame ({}): {}", e, line);
                None
            }
        }
    }

    fn next_frame(
        &mut self,
        src: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<Frame>, ProtocolError> {
        loop {
            let line = if eof {
                self.lines.decode_eof(src)
            } else {
                self.lines.decode(src)
            };

            match line {
                Ok(Some(line)) => {
                    if let Some(frame) = self.parse_line(&line) {
                        return Ok(Some(frame));
                    }
                }
                Ok(None) => return Ok(None),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    self.dropped += 1;
                    tracing::warn!(
                        "Dropping frame longer than {} bytes",
                        self.max_length
                    );
                }
                Err(LinesCodecError::Io(e)) => return Err(ProtocolError::Io(e)),
            }
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.next_frame(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.next_frame(src, true)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = frame.to_line()?;
        self.lines.encode(line, dst).map_err(|e| match e {
            LinesCodecError::Io(e) => ProtocolError::Io(e),
            LinesCodecError::MaxLineLengthExceeded => ProtocolError::LineTooLong {
                max: self.max_length,
            },
        })
    }
}
