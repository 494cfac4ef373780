//! Cryptographic adapter for the HSM command simulator.
//!
//! Wraps TDES-ECB (via `RustCrypto`'s `des` crate), key check values, DES key
//! parity, Visa PVV/CVV and ISO-9564 format-0 PIN block handling behind a
//! single [`LmkContext`] bound to the simulator's Local Master Key.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod kcv;
mod parity;
mod pinblock;
mod tdes;
mod visa;

pub use error::{CryptoError, Result};
pub use parity::{check_key_parity, modify_key_parity};
pub use tdes::{decode_hex_key, KeyRaw, TdesEcb};

/// Everything the command handlers need from the simulator's Local Master
/// Key: encrypting/decrypting working keys and PIN blocks under it, and
/// computing the check values, Visa values and PIN digits derived from it.
pub struct LmkContext {
    lmk: TdesEcb,
}

impl LmkContext {
    /// Build a context bound to a clear 16-byte LMK.
    #[must_use]
    pub fn new(lmk: KeyRaw) -> Self {
        Self { lmk: TdesEcb::new(&lmk) }
    }

    /// Encrypt a clear 16-byte key under the LMK.
    #[must_use]
    pub fn encrypt_key(&self, clear_key: &KeyRaw) -> Vec<u8> {
        self.lmk.encrypt(clear_key)
    }

    /// Decrypt an LMK-encrypted key (ASCII hex, optional scheme prefix)
    /// into its clear 16-byte form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if the field is not valid hex or does not
    /// decode to 16 raw bytes.
    pub fn decrypt_key(&self, encrypted_ascii_hex: &[u8]) -> Result<KeyRaw> {
        pinblock::decrypt_encrypted_key(&self.lmk, encrypted_ascii_hex)
    }

    /// Compute the key check value for a clear key: leading `length` hex
    /// digits of LMK-style ECB-encrypting an all-zero block under the key.
    #[must_use]
    pub fn kcv(&self, key: &KeyRaw, length: usize) -> String {
        kcv::kcv(key, length)
    }

    /// Decrypt an encrypted PIN block under an LMK-encrypted terminal key,
    /// returning the 16 uppercase hex characters of the clear PIN block.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if either field is not valid hex of the
    /// expected length.
    pub fn decrypt_pinblock(
        &self,
        encrypted_pinblock_hex: &[u8],
        encrypted_terminal_key_ascii: &[u8],
    ) -> Result<String> {
        pinblock::decrypt_pinblock(&self.lmk, encrypted_pinblock_hex, encrypted_terminal_key_ascii)
    }

    /// Extract the clear PIN digits from a decrypted ISO-9564 format-0 PIN
    /// block, `XORed` against the account number field.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPinBlock`] on a malformed block.
    pub fn clear_pin(&self, decrypted_pinblock_hex: &[u8], account_hex: &[u8]) -> Result<String> {
        pinblock::clear_pin(decrypted_pinblock_hex, account_hex)
    }

    /// Compute a Visa PVV.
    #[must_use]
    pub fn visa_pvv(&self, account: &str, pvki: u8, pin: &str, pvk_pair: &KeyRaw) -> String {
        visa::visa_pvv(account, pvki, pin, pvk_pair)
    }

    /// Compute a Visa CVV/CVV2.
    #[must_use]
    pub fn visa_cvv(
        &self,
        pan: &str,
        expiration_date: &str,
        service_code: &str,
        cvk_pair: &KeyRaw,
    ) -> String {
        visa::visa_cvv(pan, expiration_date, service_code, cvk_pair)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn lmk() -> KeyRaw {
        let raw = hex::decode("deafbeedeafbeedeafbeedeafbeedeaf").unwrap();
        raw.try_into().unwrap()
    }

    #[test]
    fn context_kcv_matches_known_value() {
        let ctx = LmkContext::new(lmk());
        assert_eq!(ctx.kcv(&lmk(), 16), "F4EDC8DEB67F6E28");
    }

    #[test]
    fn context_roundtrips_key_encryption() {
        let ctx = LmkContext::new(lmk());
        let clear_key: KeyRaw = *b"0123456789ABCDEF";
        let encrypted = ctx.encrypt_key(&clear_key);
        let encrypted_hex = hex::encode_upper(&encrypted);
        let recovered = ctx.decrypt_key(encrypted_hex.as_bytes()).unwrap();
        assert_eq!(recovered, clear_key);
    }

    #[test]
    fn context_decrypt_key_accepts_scheme_prefix() {
        let ctx = LmkContext::new(lmk());
        let clear_key: KeyRaw = *b"FEDCBA9876543210";
        let encrypted = ctx.encrypt_key(&clear_key);
        let encrypted_hex = format!("U{}", hex::encode_upper(&encrypted));
        let recovered = ctx.decrypt_key(encrypted_hex.as_bytes()).unwrap();
        assert_eq!(recovered, clear_key);
    }
}
