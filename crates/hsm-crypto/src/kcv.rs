//! Key check value computation.

use crate::tdes::TdesEcb;

/// Compute the key check value for `key`: encrypt an all-zero 8-byte block
/// under `key` and return the first `length` hex digits, uppercase.
#[must_use]
pub fn kcv(key: &[u8; 16], length: usize) -> String {
    let ecb = TdesEcb::new(key);
    let block = ecb.encrypt(&[0u8; 8]);
    let full = hex::encode_upper(block);
    full[..length.min(full.len())].to_string()
}
