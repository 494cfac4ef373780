//! Error types surfaced by the command handlers.

use hsm_crypto::CryptoError;
use hsm_proto::ProtocolError;
use thiserror::Error;

/// Errors a handler or the dispatch table cannot express directly as a
/// response error code. Any variant here means no response is sent for
/// that frame; the session layer logs it and moves on to the next frame.
///
/// [`HandlerError::SchemaViolation`] was CA's format-mismatch case in the
/// original implementation (spec.md §7); the CA handler now resolves that
/// case itself into a well-formed `CB`/`05` response (spec.md §9 open
/// question, resolved per the REDESIGN guidance) rather than raising this
/// variant. Primitive crypto failures (bad hex, invalid PIN blocks) are
/// likewise caught inside the handlers that can hit them and folded into
/// error code `01` rather than raised here (spec.md §7); in practice only
/// malformed request bodies and non-UTF-8 text fields reach this type now.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// A request body did not match its command's schema in a way no
    /// handler can recover from.
    #[error("unsupported request shape: {0}")]
    SchemaViolation(String),

    /// A primitive crypto operation failed unexpectedly (bad hex, invalid
    /// PIN block) in a spot the handler cannot fold into an error code.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The request body could not be parsed into a typed request record.
    #[error(transparent)]
    Parse(#[from] ProtocolError),
}

/// Convenience alias for handler results.
pub type Result<T> = std::result::Result<T, HandlerError>;
