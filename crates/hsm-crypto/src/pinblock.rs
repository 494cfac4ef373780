//! ISO-9564 format-0 PIN block extraction and the LMK-keyed decryption
//! helpers the command handlers build on.

use crate::{
    error::{CryptoError, Result},
    tdes::{decode_hex_key, TdesEcb},
};

/// Strip a leading scheme-prefix character (`U`, `T`, `S`, `X`) if present.
#[must_use]
pub fn strip_scheme_prefix(key: &[u8]) -> &[u8] {
    match key.first() {
        Some(b'U' | b'T' | b'S' | b'X') => &key[1..],
        _ => key,
    }
}

/// Decrypt an LMK-encrypted key (ASCII hex, optional scheme prefix) into its
/// clear 16-byte form.
pub fn decrypt_encrypted_key(lmk: &TdesEcb, encrypted_ascii_hex: &[u8]) -> Result<[u8; 16]> {
    let stripped = strip_scheme_prefix(encrypted_ascii_hex);
    let cipher_raw = decode_hex_key(stripped, 16)?;
    let clear = lmk.decrypt(&cipher_raw);
    clear.try_into().map_err(|v: Vec<u8>| CryptoError::InvalidKeyLength {
        expected: 16,
        actual: v.len(),
    })
}

/// Decrypt an encrypted PIN block under an LMK-encrypted terminal key.
///
/// 1. Derive the clear terminal key via [`decrypt_encrypted_key`].
/// 2. ECB-decrypt the 8-byte PIN block (16 hex chars) under that key.
/// 3. Return the result as 16 uppercase hex characters.
pub fn decrypt_pinblock(
    lmk: &TdesEcb,
    encrypted_pinblock_hex: &[u8],
    encrypted_terminal_key_ascii: &[u8],
) -> Result<String> {
    let clear_terminal_key = decrypt_encrypted_key(lmk, encrypted_terminal_key_ascii)?;
    let terminal_cipher = TdesEcb::new(&clear_terminal_key);

    let pin_block_raw = decode_hex_key(encrypted_pinblock_hex, 8)?;
    let decrypted = terminal_cipher.decrypt(&pin_block_raw);

    Ok(hex::encode_upper(decrypted))
}

/// Extract the clear PIN digits from a decrypted ISO-9564 format-0 PIN
/// block, `XORed` against the account number's zero-padded field.
///
/// # Errors
///
/// [`CryptoError::InvalidPinBlock`] if the recovered format nibble is not
/// `0`, the PIN length is out of the valid `4..=12` range, any PIN digit is
/// not `0..=9`, or the trailing filler nibbles are not all `F`.
pub fn clear_pin(decrypted_pinblock_hex: &[u8], account_hex: &[u8]) -> Result<String> {
    let pin_block_raw = decode_hex_key(decrypted_pinblock_hex, 8)?;

    let mut account_field = [0u8; 8];
    let account_digits = decode_hex_key(&rightmost(account_hex, 12), 6)?;
    account_field[2..8].copy_from_slice(&account_digits);

    let xored: Vec<u8> =
        pin_block_raw.iter().zip(account_field.iter()).map(|(a, b)| a ^ b).collect();
    let pin_field = hex::encode_upper(&xored);
    let chars: Vec<char> = pin_field.chars().collect();

    if chars[0] != '0' {
        return Err(CryptoError::InvalidPinBlock("unsupported PIN block format nibble"));
    }

    let pin_len = chars[1].to_digit(16).ok_or(CryptoError::InvalidPinBlock("bad length nibble"))?;
    if !(4..=12).contains(&pin_len) {
        return Err(CryptoError::InvalidPinBlock("PIN length out of range"));
    }
    let pin_len = pin_len as usize;

    let pin_digits = &chars[2..2 + pin_len];
    if pin_digits.iter().any(|c| !c.is_ascii_digit()) {
        return Err(CryptoError::InvalidPinBlock("PIN digits contain non-decimal nibble"));
    }

    let filler = &chars[2 + pin_len..];
    if filler.iter().any(|&c| c != 'F') {
        return Err(CryptoError::InvalidPinBlock("filler nibbles are not all F"));
    }

    Ok(pin_digits.iter().collect())
}

/// Take the rightmost `n` ASCII bytes of `value` (used to select the
/// account-number digits `XORed` into the PIN block).
fn rightmost(value: &[u8], n: usize) -> Vec<u8> {
    if value.len() <= n {
        value.to_vec()
    } else {
        value[value.len() - n..].to_vec()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn build_pin_block(pin: &str) -> [u8; 8] {
        let mut nibbles = vec![0u8, pin.len() as u8];
        for c in pin.chars() {
            nibbles.push(c.to_digit(10).unwrap() as u8);
        }
        while nibbles.len() < 16 {
            nibbles.push(0xF);
        }
        let mut out = [0u8; 8];
        for (i, pair) in nibbles.chunks(2).enumerate() {
            out[i] = (pair[0] << 4) | pair[1];
        }
        out
    }

    #[test]
    fn clear_pin_roundtrips_through_account_xor() {
        let account = b"123456789012";
        let pin_field = build_pin_block("1234");

        let mut account_field = [0u8; 8];
        let digits = decode_hex_key(&rightmost(account, 12), 6).unwrap();
        account_field[2..8].copy_from_slice(&digits);

        let xored: Vec<u8> =
            pin_field.iter().zip(account_field.iter()).map(|(a, b)| a ^ b).collect();
        let decrypted_hex = hex::encode_upper(&xored);

        let pin = clear_pin(decrypted_hex.as_bytes(), account).unwrap();
        assert_eq!(pin, "1234");
    }

    #[test]
    fn clear_pin_rejects_bad_length() {
        let mut pin_field = build_pin_block("1234");
        pin_field[0] = 0x0F; // length nibble = 0xF, invalid
        let decrypted_hex = hex::encode_upper(pin_field);
        let account = b"000000000000";
        assert!(clear_pin(decrypted_hex.as_bytes(), account).is_err());
    }
}
