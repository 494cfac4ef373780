//! Error types for framing and request parsing.

use thiserror::Error;

/// Errors raised while framing or parsing a command message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The peer closed the connection while a frame was being read.
    #[error("peer closed the connection")]
    PeerClosed,

    /// A frame's declared length exceeds the configured upper bound.
    #[error("frame length {length} exceeds maximum of {max}")]
    FrameTooShort {
        /// The length the peer claimed.
        length: usize,
        /// The configured maximum.
        max: usize,
    },

    /// The length prefix did not match the number of payload bytes supplied.
    #[error("length prefix {declared} does not match payload length {actual}")]
    LengthMismatch {
        /// Length declared by the prefix.
        declared: usize,
        /// Actual number of bytes in the payload.
        actual: usize,
    },

    /// The payload is shorter than the 4-byte header plus 2-byte command code.
    #[error("frame payload of {actual} bytes is shorter than the 6-byte header+code")]
    Truncated {
        /// Actual payload length.
        actual: usize,
    },

    /// A required fixed-width field ran off the end of the command body.
    #[error("field {field} ran off the end of the command body")]
    ParseError {
        /// Name of the field that could not be extracted.
        field: &'static str,
    },
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
