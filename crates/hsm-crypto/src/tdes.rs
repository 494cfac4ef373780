//! TDES-ECB block cipher context over a 16-byte double-length key.
//!
//! The simulator's LMK and every working key it manipulates are 16-byte
//! double-length TDES keys, used in EDE mode (`K1`, `K2`, `K1`) exactly as
//! the reference implementation's `pycryptodome` `DES3.new(key, MODE_ECB)`
//! behaves for a 16-byte key.

use cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use des::TdesEde2;

use crate::error::{CryptoError, Result};

/// A clear, double-length (16-byte) TDES key.
pub type KeyRaw = [u8; 16];

/// TDES-ECB context bound to a single 16-byte key.
///
/// Block-by-block ECB transform on 8-byte-aligned buffers, matching the
/// adapter contract in spec.md §4.4.
pub struct TdesEcb {
    cipher: TdesEde2,
}

impl TdesEcb {
    /// Build a new ECB context from a clear 16-byte key.
    #[must_use]
    pub fn new(key: &KeyRaw) -> Self {
        Self { cipher: TdesEde2::new(GenericArray::from_slice(key)) }
    }

    /// Encrypt a buffer whose length is a multiple of 8 bytes, block by block.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not a multiple of 8; callers only ever pass
    /// PIN blocks and 16-byte keys, both of which satisfy this.
    #[must_use]
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        self.transform(data, true)
    }

    /// Decrypt a buffer whose length is a multiple of 8 bytes, block by block.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not a multiple of 8.
    #[must_use]
    pub fn decrypt(&self, data: &[u8]) -> Vec<u8> {
        self.transform(data, false)
    }

    fn transform(&self, data: &[u8], encrypt: bool) -> Vec<u8> {
        assert!(data.len().is_multiple_of(8), "TDES-ECB operates on 8-byte-aligned buffers");
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(8) {
            let mut block = GenericArray::clone_from_slice(chunk);
            if encrypt {
                self.cipher.encrypt_block(&mut block);
            } else {
                self.cipher.decrypt_block(&mut block);
            }
            out.extend_from_slice(&block);
        }
        out
    }
}

/// Decode an ASCII hex key, requiring an exact raw byte length.
pub fn decode_hex_key(hex_bytes: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let hex_str =
        std::str::from_utf8(hex_bytes).map_err(|_| CryptoError::InvalidHex("non-UTF8".into()))?;
    let raw = hex::decode(hex_str).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    if raw.len() != expected_len {
        return Err(CryptoError::InvalidKeyLength { expected: expected_len, actual: raw.len() });
    }
    Ok(raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key: KeyRaw = *b"0123456789ABCDEF";
        let ecb = TdesEcb::new(&key);
        let plaintext = b"ABCDEFGH";
        let ciphertext = ecb.encrypt(plaintext);
        let recovered = ecb.decrypt(&ciphertext);
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn zero_block_kcv_is_stable() {
        let key: KeyRaw = [0xAA; 16];
        let ecb = TdesEcb::new(&key);
        let a = ecb.encrypt(&[0u8; 8]);
        let b = ecb.encrypt(&[0u8; 8]);
        assert_eq!(a, b);
    }
}
