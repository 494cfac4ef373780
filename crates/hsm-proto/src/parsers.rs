//! Request body parsers, one per command code.
//!
//! Parsers consume the body positionally. Trailing bytes beyond a command's
//! schema are ignored; a parser fails with [`ProtocolError::ParseError`] only
//! when a required fixed-width field would run off the end of the body.

use bytes::Bytes;

use crate::{
    error::{ProtocolError, Result},
    request::{
        A0Fields, BuFields, CaFields, CwFields, CyFields, DcFields, EcFields, FaFields, HcFields,
        Request,
    },
};

/// Cursor over a command body, consuming fields left to right.
struct Cursor {
    data: Bytes,
}

impl Cursor {
    fn new(body: Bytes) -> Self {
        Self { data: body }
    }

    fn peek(&self) -> Option<u8> {
        self.data.first().copied()
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<Bytes> {
        if self.data.len() < len {
            return Err(ProtocolError::ParseError { field });
        }
        let value = self.data.slice(..len);
        self.data = self.data.slice(len..);
        Ok(value)
    }

    fn take_byte(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(field, 1)?[0])
    }

    /// Consume bytes up to (not including) the next `;`, then skip the
    /// delimiter itself.
    fn take_until_semicolon(&mut self, field: &'static str) -> Result<Bytes> {
        let index = self.data.iter().position(|&b| b == b';');
        match index {
            Some(index) => {
                let value = self.data.slice(..index);
                self.data = self.data.slice(index + 1..);
                Ok(value)
            },
            None => Err(ProtocolError::ParseError { field }),
        }
    }

    /// Width for a key field whose first byte may be one of `prefixes`.
    fn keyed_width(&self, prefixes: &[u8]) -> usize {
        match self.peek() {
            Some(b) if prefixes.contains(&b) => 33,
            _ => 32,
        }
    }
}

/// Parse an `A0` ("Generate a key") request body.
pub fn parse_a0(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let mode = c.take_byte("Mode")?;
    let key_type = c.take("Key Type", 3)?;
    let key_scheme = c.take_byte("Key Scheme")?;

    let mut zmk_tmk_flag = None;
    let mut zmk_tmk = None;

    if mode == b'1' {
        if c.peek() == Some(b';') {
            c.take_byte("delimiter")?;
            zmk_tmk_flag = Some(c.take_byte("ZMK/TMK Flag")?);
        }
        if c.peek() == Some(b'U') {
            zmk_tmk = Some(c.take("ZMK/TMK", 33)?);
        }
    }

    Ok(Request::A0(A0Fields { mode, key_type, key_scheme, zmk_tmk_flag, zmk_tmk }))
}

/// Parse a `BU` ("Generate a key check value") request body.
pub fn parse_bu(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let key_type_code = c.take("Key Type Code", 2)?;
    let key_length_flag = c.take_byte("Key Length Flag")?;
    let width = c.keyed_width(b"U");
    let key = c.take("Key", width)?;

    Ok(Request::Bu(BuFields { key_type_code, key_length_flag, key }))
}

/// Parse a `CA` ("Translate PIN from TPK to ZPK") request body.
pub fn parse_ca(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let tpk_width = c.keyed_width(b"UTS");
    let tpk = c.take("TPK", tpk_width)?;
    let dest_width = c.keyed_width(b"UTS");
    let destination_key = c.take("Destination Key", dest_width)?;
    let max_pin_len = c.take("Maximum PIN Length", 2)?;
    let source_pin_block = c.take("Source PIN block", 16)?;
    let source_pin_block_format = c.take("Source PIN block format", 2)?;
    let destination_pin_block_format = c.take("Destination PIN block format", 2)?;
    let account_number = c.take("Account Number", 12)?;

    Ok(Request::Ca(CaFields {
        tpk,
        destination_key,
        max_pin_len,
        source_pin_block,
        source_pin_block_format,
        destination_pin_block_format,
        account_number,
    }))
}

/// Parse a `CW` ("Generate a CVV") request body.
pub fn parse_cw(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let cvk_width = c.keyed_width(b"UTS");
    let cvk = c.take("CVK", cvk_width)?;
    let pan = c.take_until_semicolon("Primary Account Number")?;
    let expiration_date = c.take("Expiration Date", 4)?;
    let service_code = c.take("Service Code", 3)?;

    Ok(Request::Cw(CwFields { cvk, pan, expiration_date, service_code }))
}

/// Parse a `CY` ("Verify a CVV") request body.
pub fn parse_cy(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let cvk_width = c.keyed_width(b"UTS");
    let cvk = c.take("CVK", cvk_width)?;
    let cvv = c.take("CVV", 3)?;
    let pan = c.take_until_semicolon("Primary Account Number")?;
    let expiration_date = c.take("Expiration Date", 4)?;
    let service_code = c.take("Service Code", 3)?;

    Ok(Request::Cy(CyFields { cvk, cvv, pan, expiration_date, service_code }))
}

/// Parse a `DC` ("Verify PIN") request body.
pub fn parse_dc(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let tpk_width = c.keyed_width(b"UTS");
    let tpk = c.take("TPK", tpk_width)?;
    let pvk_width = c.keyed_width(b"U");
    let pvk_pair = c.take("PVK Pair", pvk_width)?;
    let pin_block = c.take("PIN block", 16)?;
    let pin_block_format = c.take("PIN block format code", 2)?;
    let account_number = c.take("Account Number", 12)?;
    let pvki = c.take_byte("PVKI")?;
    let pvv = c.take("PVV", 4)?;

    Ok(Request::Dc(DcFields { tpk, pvk_pair, pin_block, pin_block_format, account_number, pvki, pvv }))
}

/// Parse an `EC` ("Verify PIN using the ABA PVV method") request body.
pub fn parse_ec(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let zpk_width = c.keyed_width(b"U");
    let zpk = c.take("ZPK", zpk_width)?;
    let pvk_width = c.keyed_width(b"U");
    let pvk_pair = c.take("PVK Pair", pvk_width)?;
    let pin_block = c.take("PIN block", 16)?;
    let pin_block_format = c.take("PIN block format code", 2)?;

    let (account_number, token) = if pin_block_format.as_ref() == b"04" {
        (None, Some(c.take("Token", 18)?))
    } else {
        (Some(c.take("Account Number", 12)?), None)
    };

    let pvki = c.take_byte("PVKI")?;
    let pvv = c.take("PVV", 4)?;

    Ok(Request::Ec(EcFields {
        zpk,
        pvk_pair,
        pin_block,
        pin_block_format,
        account_number,
        token,
        pvki,
        pvv,
    }))
}

/// Parse an `FA` ("Translate a ZPK from ZMK to LMK") request body.
pub fn parse_fa(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);

    let zmk = if matches!(c.peek(), Some(b'U' | b'T')) {
        Some(c.take("ZMK", 33)?)
    } else {
        None
    };

    let zpk = if matches!(c.peek(), Some(b'U' | b'T' | b'X')) {
        Some(c.take("ZPK", 33)?)
    } else {
        None
    };

    Ok(Request::Fa(FaFields { zmk, zpk }))
}

/// Parse an `HC` ("Generate a TMK, TPK or PVK") request body.
pub fn parse_hc(body: Bytes) -> Result<Request> {
    let mut c = Cursor::new(body);
    let width = if c.peek() == Some(b'U') { 33 } else { 16 };
    let current_key = c.take("Current Key", width)?;
    c.take_byte("delimiter")?;
    let key_scheme_tmk = c.take_byte("Key Scheme (TMK)")?;
    let key_scheme_lmk = c.take_byte("Key Scheme (LMK)")?;

    Ok(Request::Hc(HcFields { current_key, key_scheme_tmk, key_scheme_lmk }))
}

/// Parse an `NC` ("Diagnostics") request body. The body carries no fields.
pub fn parse_nc(_body: Bytes) -> Result<Request> {
    Ok(Request::Nc)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn a0_without_mode_one_skips_zmk() {
        let body = Bytes::from_static(b"0001U");
        let req = parse_a0(body).unwrap();
        let Request::A0(fields) = req else { panic!("wrong variant") };
        assert_eq!(fields.mode, b'0');
        assert_eq!(fields.zmk_tmk, None);
    }

    #[test]
    fn a0_with_mode_one_and_zmk() {
        let mut body = b"1001X;1U".to_vec();
        body.extend_from_slice(&[b'A'; 32]);
        let req = parse_a0(Bytes::from(body)).unwrap();
        let Request::A0(fields) = req else { panic!("wrong variant") };
        assert_eq!(fields.mode, b'1');
        assert_eq!(fields.zmk_tmk_flag, Some(b'1'));
        assert!(fields.zmk_tmk.is_some());
        assert_eq!(fields.zmk_tmk.unwrap().len(), 33);
    }

    #[test]
    fn bu_keyed_width_with_prefix() {
        let mut body = b"000".to_vec();
        body.push(b'U');
        body.extend_from_slice(&[b'1'; 32]);
        let req = parse_bu(Bytes::from(body)).unwrap();
        let Request::Bu(fields) = req else { panic!("wrong variant") };
        assert_eq!(fields.key.len(), 33);
    }

    #[test]
    fn cw_pan_stops_at_semicolon() {
        let mut body = Vec::new();
        body.push(b'U');
        body.extend_from_slice(&[b'A'; 32]);
        body.extend_from_slice(b"4111111111111111;2512123");
        let req = parse_cw(Bytes::from(body)).unwrap();
        let Request::Cw(fields) = req else { panic!("wrong variant") };
        assert_eq!(fields.pan.as_ref(), b"4111111111111111");
        assert_eq!(fields.expiration_date.as_ref(), b"2512");
        assert_eq!(fields.service_code.as_ref(), b"123");
    }

    #[test]
    fn ec_token_branch_on_format_04() {
        let mut body = vec![b'U'];
        body.extend_from_slice(&[b'1'; 32]); // ZPK
        body.extend_from_slice(&[b'2'; 32]); // PVK pair
        body.extend_from_slice(&[b'3'; 16]); // PIN block
        body.extend_from_slice(b"04");
        body.extend_from_slice(&[b'4'; 18]); // token
        body.push(b'1'); // pvki
        body.extend_from_slice(b"9999"); // pvv
        let req = parse_ec(Bytes::from(body)).unwrap();
        let Request::Ec(fields) = req else { panic!("wrong variant") };
        assert!(fields.token.is_some());
        assert!(fields.account_number.is_none());
    }

    #[test]
    fn parse_error_on_truncated_fixed_field() {
        let body = Bytes::from_static(b"NC");
        let err = parse_dc(body).unwrap_err();
        assert!(matches!(err, ProtocolError::ParseError { .. }));
    }

    #[test]
    fn fa_missing_sub_keys_are_none() {
        let req = parse_fa(Bytes::new()).unwrap();
        let Request::Fa(fields) = req else { panic!("wrong variant") };
        assert!(fields.zmk.is_none());
        assert!(fields.zpk.is_none());
    }
}
