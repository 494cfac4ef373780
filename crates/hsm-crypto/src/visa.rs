//! Visa PIN Verification Value (PVV) and Card Verification Value (CVV)
//! algorithms, built on the TDES-ECB adapter in [`crate::tdes`].

use crate::tdes::TdesEcb;

/// Compute a Visa PVV.
///
/// Builds the standard 16-digit transformation block (rightmost 11 digits
/// of the account number, PVKI, 4-digit PIN), encrypts it under the PVK
/// pair, then decimalizes the result to 4 digits via two passes: decimal
/// digits first, then the hex letters `A`-`F` mapped to `0`-`5` (`-10`).
#[must_use]
pub fn visa_pvv(account: &str, pvki: u8, pin: &str, pvk_pair: &[u8; 16]) -> String {
    let account_digits = rightmost_digits(account, 11);
    let block = format!("{account_digits}{pvki}{pin}");
    let block_raw = decimal_string_to_bcd(&block);

    let ecb = TdesEcb::new(pvk_pair);
    let encrypted = ecb.encrypt(&block_raw);
    let hex_digits = hex::encode(encrypted);

    decimalize(&hex_digits, 4)
}

/// Compute a Visa CVV/CVV2.
///
/// Builds the standard CVV transformation blocks from PAN, expiration date
/// and service code, double-encrypts under the CVK pair (encrypt under
/// `CVK_A`, XOR, encrypt under `CVK_A`, decrypt under `CVK_B`, encrypt
/// under `CVK_A` — the conventional two-block CVK construction), then
/// decimalizes to 3 digits.
#[must_use]
pub fn visa_cvv(pan: &str, expiration_date: &str, service_code: &str, cvk_pair: &[u8; 16]) -> String {
    // PAN + expiry + service code, zero-padded on the right to two 16-digit
    // (8-byte BCD) blocks.
    let data = format!("{pan}{expiration_date}{service_code}");
    let mut digits: Vec<u8> = data.chars().filter_map(|c| c.to_digit(10)).map(|d| d as u8).collect();
    digits.resize(32, 0);
    let first_half = pack_bcd(&digits[..16]);
    let second_half = pack_bcd(&digits[16..32]);

    let mut cvk_a = [0u8; 8];
    cvk_a.copy_from_slice(&cvk_pair[..8]);
    let mut cvk_b = [0u8; 8];
    cvk_b.copy_from_slice(&cvk_pair[8..]);

    let mut cvk_a_key = [0u8; 16];
    cvk_a_key[..8].copy_from_slice(&cvk_a);
    cvk_a_key[8..].copy_from_slice(&cvk_a);
    let ecb_a = TdesEcb::new(&cvk_a_key);

    let encrypted_first = ecb_a.encrypt(&first_half);
    let xored: Vec<u8> =
        encrypted_first.iter().zip(second_half.iter()).map(|(a, b)| a ^ b).collect();
    let encrypted_second = ecb_a.encrypt(&xored);

    let mut cvk_b_key = [0u8; 16];
    cvk_b_key[..8].copy_from_slice(&cvk_b);
    cvk_b_key[8..].copy_from_slice(&cvk_b);
    let ecb_b = TdesEcb::new(&cvk_b_key);
    let decrypted = ecb_b.decrypt(&encrypted_second);
    let final_block = ecb_a.encrypt(&decrypted);

    let hex_digits = hex::encode(final_block);
    decimalize(&hex_digits, 3)
}

/// Take the rightmost `n` decimal digits of `value` (digits only).
fn rightmost_digits(value: &str, n: usize) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= n {
        digits
    } else {
        digits[digits.len() - n..].to_string()
    }
}

/// Encode a decimal-digit string as packed BCD nibbles, zero-padded on the
/// right to 8 bytes.
fn decimal_string_to_bcd(digits: &str) -> [u8; 8] {
    let mut nibbles: Vec<u8> = digits.chars().map(|c| c.to_digit(10).unwrap_or(0) as u8).collect();
    nibbles.resize(16, 0);
    let mut out = [0u8; 8];
    for (i, pair) in nibbles.chunks(2).enumerate() {
        out[i] = (pair[0] << 4) | pair[1];
    }
    out
}

/// Pack 16 decimal-digit nibbles into an 8-byte BCD block.
fn pack_bcd(nibbles: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, pair) in nibbles.chunks(2).enumerate() {
        out[i] = (pair[0] << 4) | pair[1];
    }
    out
}

/// Decimalize a hex digit string to `out_len` decimal digits: first pass
/// takes decimal digits (`0`-`9`) in order, second pass maps hex letters
/// `a`-`f` to `0`-`5` (`value - 10`) in order, until `out_len` digits are
/// collected.
fn decimalize(hex_digits: &str, out_len: usize) -> String {
    let mut result = String::with_capacity(out_len);
    for c in hex_digits.chars() {
        if result.len() >= out_len {
            break;
        }
        if c.is_ascii_digit() {
            result.push(c);
        }
    }
    if result.len() < out_len {
        for c in hex_digits.chars() {
            if result.len() >= out_len {
                break;
            }
            if c.is_ascii_hexdigit() && !c.is_ascii_digit() {
                let value = c.to_digit(16).unwrap_or(10) - 10;
                result.push(char::from_digit(value, 10).unwrap_or('0'));
            }
        }
    }
    result
}
