//! Per-command request records.
//!
//! Each command code has its own field record, strongly typed instead of a
//! string-keyed map. An ordered `trace_fields` list is kept alongside each
//! record purely for tracing — it plays no role in dispatch.

use bytes::Bytes;

/// A field name paired with its raw wire bytes, in parse order.
pub type TraceFields<'a> = Vec<(&'static str, &'a [u8])>;

/// Fields for command `A0` ("Generate a key").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A0Fields {
    /// Mode of operation (`0` generate only, `1` also wrap under a ZMK/TMK).
    pub mode: u8,
    /// 3-character key type code.
    pub key_type: Bytes,
    /// 1-character key scheme.
    pub key_scheme: u8,
    /// ZMK/TMK flag, present only when `mode == b'1'` and a `;` delimiter follows.
    pub zmk_tmk_flag: Option<u8>,
    /// ZMK or TMK under LMK, present only when prefixed with `U`.
    pub zmk_tmk: Option<Bytes>,
}

/// Fields for command `BU` ("Generate a key check value").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuFields {
    /// 2-character key type code.
    pub key_type_code: Bytes,
    /// 1-character key length flag.
    pub key_length_flag: u8,
    /// Key under LMK.
    pub key: Bytes,
}

/// Fields for command `CA` ("Translate PIN from TPK to ZPK").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaFields {
    /// Terminal PIN key under LMK.
    pub tpk: Bytes,
    /// Destination key (ZPK) under LMK.
    pub destination_key: Bytes,
    /// Maximum PIN length.
    pub max_pin_len: Bytes,
    /// Source PIN block (16 hex chars).
    pub source_pin_block: Bytes,
    /// Source PIN block format code.
    pub source_pin_block_format: Bytes,
    /// Destination PIN block format code.
    pub destination_pin_block_format: Bytes,
    /// Account number (12 characters).
    pub account_number: Bytes,
}

/// Fields for command `CW` ("Generate a card verification value").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CwFields {
    /// Card verification key under LMK.
    pub cvk: Bytes,
    /// Primary account number.
    pub pan: Bytes,
    /// Expiration date (YYMM).
    pub expiration_date: Bytes,
    /// Service code.
    pub service_code: Bytes,
}

/// Fields for command `CY` ("Verify a card verification value").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyFields {
    /// Card verification key under LMK.
    pub cvk: Bytes,
    /// CVV supplied by the caller.
    pub cvv: Bytes,
    /// Primary account number.
    pub pan: Bytes,
    /// Expiration date (YYMM).
    pub expiration_date: Bytes,
    /// Service code.
    pub service_code: Bytes,
}

/// Fields for command `DC` ("Verify PIN").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcFields {
    /// Terminal PIN key under LMK.
    pub tpk: Bytes,
    /// PIN verification key pair under LMK.
    pub pvk_pair: Bytes,
    /// Encrypted PIN block (16 hex chars).
    pub pin_block: Bytes,
    /// PIN block format code.
    pub pin_block_format: Bytes,
    /// Account number.
    pub account_number: Bytes,
    /// PVK index digit.
    pub pvki: u8,
    /// PVV supplied by the caller.
    pub pvv: Bytes,
}

/// Fields for command `EC` ("Verify PIN using the ABA PVV method").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcFields {
    /// Zone PIN key under LMK.
    pub zpk: Bytes,
    /// PIN verification key pair under LMK.
    pub pvk_pair: Bytes,
    /// Encrypted PIN block (16 hex chars).
    pub pin_block: Bytes,
    /// PIN block format code.
    pub pin_block_format: Bytes,
    /// Account number, present when `pin_block_format != b"04"`.
    pub account_number: Option<Bytes>,
    /// Token, present when `pin_block_format == b"04"`.
    pub token: Option<Bytes>,
    /// PVK index digit.
    pub pvki: u8,
    /// PVV supplied by the caller.
    pub pvv: Bytes,
}

/// Fields for command `FA` ("Translate a ZPK from ZMK to LMK").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaFields {
    /// Zone master key under LMK, present only when prefixed.
    pub zmk: Option<Bytes>,
    /// Zone PIN key under ZMK, present only when prefixed.
    pub zpk: Option<Bytes>,
}

/// Fields for command `HC` ("Generate a TMK, TPK or PVK").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HcFields {
    /// Current key, under LMK if `U`-prefixed, otherwise raw hex.
    pub current_key: Bytes,
    /// Key scheme for the TMK.
    pub key_scheme_tmk: u8,
    /// Key scheme for the LMK.
    pub key_scheme_lmk: u8,
}

/// A parsed request, tagged by command code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `A0` — generate a key.
    A0(A0Fields),
    /// `BU` — generate a key check value.
    Bu(BuFields),
    /// `CA` — translate a PIN block between working keys.
    Ca(CaFields),
    /// `CW` — generate a CVV.
    Cw(CwFields),
    /// `CY` — verify a CVV.
    Cy(CyFields),
    /// `DC` — verify a PIN (TPK/PVV).
    Dc(DcFields),
    /// `EC` — verify a PIN (ABA PVV).
    Ec(EcFields),
    /// `FA` — translate a ZPK from ZMK to LMK.
    Fa(FaFields),
    /// `HC` — generate a TMK/TPK/PVK.
    Hc(HcFields),
    /// `NC` — diagnostics, carries no fields.
    Nc,
}

impl Request {
    /// Ordered field list for tracing. Plays no role in dispatch.
    #[must_use]
    pub fn trace_fields(&self) -> TraceFields<'_> {
        match self {
            Self::A0(f) => {
                let mut fields: TraceFields<'_> = vec![
                    ("Mode", std::slice::from_ref(&f.mode)),
                    ("Key Type", &f.key_type),
                    ("Key Scheme", std::slice::from_ref(&f.key_scheme)),
                ];
                if let Some(flag) = &f.zmk_tmk_flag {
                    fields.push(("ZMK/TMK Flag", std::slice::from_ref(flag)));
                }
                if let Some(key) = &f.zmk_tmk {
                    fields.push(("ZMK/TMK", key));
                }
                fields
            },
            Self::Bu(f) => vec![
                ("Key Type Code", &f.key_type_code),
                ("Key Length Flag", std::slice::from_ref(&f.key_length_flag)),
                ("Key", &f.key),
            ],
            Self::Ca(f) => vec![
                ("TPK", &f.tpk),
                ("Destination Key", &f.destination_key),
                ("Maximum PIN Length", &f.max_pin_len),
                ("Source PIN block", &f.source_pin_block),
                ("Source PIN block format", &f.source_pin_block_format),
                ("Destination PIN block format", &f.destination_pin_block_format),
                ("Account Number", &f.account_number),
            ],
            Self::Cw(f) => vec![
                ("CVK", &f.cvk),
                ("Primary Account Number", &f.pan),
                ("Expiration Date", &f.expiration_date),
                ("Service Code", &f.service_code),
            ],
            Self::Cy(f) => vec![
                ("CVK", &f.cvk),
                ("CVV", &f.cvv),
                ("Primary Account Number", &f.pan),
                ("Expiration Date", &f.expiration_date),
                ("Service Code", &f.service_code),
            ],
            Self::Dc(f) => vec![
                ("TPK", &f.tpk),
                ("PVK Pair", &f.pvk_pair),
                ("PIN block", &f.pin_block),
                ("PIN block format code", &f.pin_block_format),
                ("Account Number", &f.account_number),
                ("PVKI", std::slice::from_ref(&f.pvki)),
                ("PVV", &f.pvv),
            ],
            Self::Ec(f) => {
                let mut fields: TraceFields<'_> = vec![
                    ("ZPK", &f.zpk),
                    ("PVK Pair", &f.pvk_pair),
                    ("PIN block", &f.pin_block),
                    ("PIN block format code", &f.pin_block_format),
                ];
                if let Some(account) = &f.account_number {
                    fields.push(("Account Number", account));
                }
                if let Some(token) = &f.token {
                    fields.push(("Token", token));
                }
                fields.push(("PVKI", std::slice::from_ref(&f.pvki)));
                fields.push(("PVV", &f.pvv));
                fields
            },
            Self::Fa(f) => {
                let mut fields: TraceFields<'_> = Vec::new();
                if let Some(zmk) = &f.zmk {
                    fields.push(("ZMK", zmk));
                }
                if let Some(zpk) = &f.zpk {
                    fields.push(("ZPK", zpk));
                }
                fields
            },
            Self::Hc(f) => vec![
                ("Current Key", &f.current_key),
                ("Key Scheme (TMK)", std::slice::from_ref(&f.key_scheme_tmk)),
                ("Key Scheme (LMK)", std::slice::from_ref(&f.key_scheme_lmk)),
            ],
            Self::Nc => Vec::new(),
        }
    }

    /// The 2-character ASCII command code this request was parsed from.
    #[must_use]
    pub fn command_code(&self) -> &'static [u8; 2] {
        match self {
            Self::A0(_) => b"A0",
            Self::Bu(_) => b"BU",
            Self::Ca(_) => b"CA",
            Self::Cw(_) => b"CW",
            Self::Cy(_) => b"CY",
            Self::Dc(_) => b"DC",
            Self::Ec(_) => b"EC",
            Self::Fa(_) => b"FA",
            Self::Hc(_) => b"HC",
            Self::Nc => b"NC",
        }
    }
}
