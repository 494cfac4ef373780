//! Errors surfaced by the server's transport and setup layers.

use thiserror::Error;

/// Errors that can prevent the server from starting or keep it from serving
/// a particular connection.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listener could not bind, or a socket-level operation failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A frame could not be split into header/code/body.
    #[error("protocol error: {0}")]
    Protocol(#[from] hsm_proto::ProtocolError),

    /// The LMK or another startup argument was invalid.
    #[error("configuration error: {0}")]
    Config(String),
}
