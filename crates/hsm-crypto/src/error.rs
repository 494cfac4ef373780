//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors raised by the crypto adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A key field was not valid hexadecimal.
    #[error("key is not valid hexadecimal: {0}")]
    InvalidHex(String),

    /// A key or block did not decode to the expected number of raw bytes.
    #[error("expected {expected} raw bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },

    /// A decrypted PIN block did not have a recognized format byte, a valid
    /// PIN length, or correctly padded filler nibbles.
    #[error("invalid PIN block: {0}")]
    InvalidPinBlock(&'static str),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, CryptoError>;
