//! Command dispatch and handler logic for the HSM simulator.
//!
//! Owns the [`Hsm`] instance: an immutable LMK context plus its runtime
//! options, created once at startup and shared read-only by every session
//! (spec.md §3 "Lifecycles", §5 "Shared state").

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod dispatch;
mod error;
mod handlers;

use bytes::Bytes;
use hsm_crypto::{KeyRaw, LmkContext};
pub use hsm_proto::ResponseBuilder;

pub use error::{HandlerError, Result};

/// Runtime options controlling handler leniency (spec.md §6 CLI surface).
#[derive(Debug, Clone, Copy, Default)]
pub struct HsmOptions {
    /// Emit extra debug-level tracing for parity and verification failures.
    pub debug: bool,
    /// Treat every key-parity check as trivially successful.
    pub skip_parity: bool,
    /// Force every would-be-non-zero handler error code to `00`.
    pub approve_all: bool,
}

/// The simulator instance bound to one Local Master Key.
pub struct Hsm {
    lmk: LmkContext,
    lmk_key: KeyRaw,
    options: HsmOptions,
}

impl Hsm {
    /// Build a new instance bound to a clear 16-byte LMK.
    #[must_use]
    pub fn new(lmk_key: KeyRaw, options: HsmOptions) -> Self {
        Self { lmk: LmkContext::new(lmk_key), lmk_key, options }
    }

    /// Handle one inbound frame's header, command code and body, producing
    /// a complete response.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the request body could not be parsed at all
    /// (spec.md §4.2's `ParseError`) — the caller should log it and send
    /// no reply for that frame.
    pub fn handle(&self, header: [u8; 4], command_code: [u8; 2], body: Bytes) -> Result<ResponseBuilder> {
        dispatch::dispatch(self, header, command_code, body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn lmk_key() -> KeyRaw {
        let raw = hex::decode("deafbeedeafbeedeafbeedeafbeedeaf").unwrap();
        raw.try_into().unwrap()
    }

    #[test]
    fn nc_returns_diagnostics() {
        let hsm = Hsm::new(lmk_key(), HsmOptions::default());
        let rb = hsm.handle(*b"HDR1", *b"NC", Bytes::new()).unwrap();
        assert_eq!(rb.fields()[0].1.as_ref(), b"ND");
        assert_eq!(rb.fields()[1].1.as_ref(), b"00");
        assert_eq!(rb.fields()[2].1.len(), 16);
    }

    #[test]
    fn unknown_command_returns_zz_00() {
        let hsm = Hsm::new(lmk_key(), HsmOptions::default());
        let rb = hsm.handle(*b"HDR1", *b"XX", Bytes::from_static(b"anything")).unwrap();
        assert_eq!(rb.fields()[0].1.as_ref(), b"ZZ");
        assert_eq!(rb.fields()[1].1.as_ref(), b"00");
    }

    #[test]
    fn bu_generates_kcv_for_clear_key() {
        let hsm = Hsm::new(lmk_key(), HsmOptions::default());
        let key_hex = format!("U{}", hex::encode_upper([0xABu8; 16]));
        let body = Bytes::from(format!("000{key_hex}"));
        let rb = hsm.handle(*b"HDR1", *b"BU", body).unwrap();
        assert_eq!(rb.fields()[0].1.as_ref(), b"BV");
        assert_eq!(rb.fields()[1].1.as_ref(), b"00");
        assert_eq!(rb.fields()[2].1.len(), 16);
    }

    #[test]
    fn dc_with_bad_pvk_parity_fails_then_approves_with_flag() {
        let lmk = LmkContext::new(lmk_key());
        let tpk_clear: KeyRaw = *b"0123456789ABCDEF";
        let tpk_under_lmk = lmk.encrypt_key(&tpk_clear);
        let tpk_field = format!("U{}", hex::encode_upper(tpk_under_lmk));

        // Even-parity (all-zero) PVK pair fails key parity.
        let bad_pvk: KeyRaw = [0u8; 16];
        let pvk_under_lmk = lmk.encrypt_key(&bad_pvk);
        let pvk_field = hex::encode_upper(pvk_under_lmk);

        let pin_block = TdesEcbShim::encrypt(&tpk_clear, &[0u8; 8]);
        let body = format!(
            "{tpk_field}{pvk_field}{pinblock}01{account}1{pvv}",
            pinblock = hex::encode_upper(pin_block),
            account = "000000000000",
            pvv = "0000",
        );

        let hsm = Hsm::new(lmk_key(), HsmOptions::default());
        let rb = hsm.handle(*b"HDR1", *b"DC", Bytes::from(body.clone())).unwrap();
        assert_eq!(rb.fields()[0].1.as_ref(), b"DD");
        assert!(matches!(rb.fields()[1].1.as_ref(), b"10" | b"11"));

        let approving =
            Hsm::new(lmk_key(), HsmOptions { approve_all: true, ..HsmOptions::default() });
        let rb2 = approving.handle(*b"HDR1", *b"DC", Bytes::from(body)).unwrap();
        assert_eq!(rb2.fields()[1].1.as_ref(), b"00");
    }

    struct TdesEcbShim;
    impl TdesEcbShim {
        fn encrypt(key: &KeyRaw, data: &[u8]) -> Vec<u8> {
            hsm_crypto::TdesEcb::new(key).encrypt(data)
        }
    }
}
