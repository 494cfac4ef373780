//! Wire framing, request parsers and response builder for the HSM
//! host-command protocol.
//!
//! This crate is the protocol layer only (C1, C2, C3 in the design): it
//! knows how to frame bytes, how to parse each command's body into a typed
//! [`Request`], and how to build a response frame. It has no cryptographic
//! or business logic — see `hsm-crypto` and `hsm-core` for those.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod frame;
pub mod parsers;
pub mod request;
mod response;

pub use error::{ProtocolError, Result};
pub use frame::{read_frame, split_frame, write_frame, SplitFrame, CODE_LEN, HEADER_LEN, MAX_FRAME_LEN};
pub use request::Request;
pub use response::ResponseBuilder;

/// Map a request command code to its fixed response code.
///
/// Unknown codes map to `ZZ`, the simulator's compatibility fallback
/// (spec.md §4.5).
#[must_use]
pub fn response_code_for(command_code: &[u8; 2]) -> [u8; 2] {
    match command_code {
        b"A0" => *b"A1",
        b"BU" => *b"BV",
        b"CA" => *b"CB",
        b"CW" => *b"CX",
        b"CY" => *b"CZ",
        b"DC" => *b"DD",
        b"EC" => *b"ED",
        b"FA" => *b"FB",
        b"HC" => *b"HD",
        b"NC" => *b"ND",
        _ => *b"ZZ",
    }
}

/// Parse a command body given its 2-byte command code.
///
/// Returns `None` for an unknown command code — callers should route those
/// straight to the `ZZ` response without attempting to parse a body.
#[must_use]
pub fn parse(command_code: &[u8; 2], body: bytes::Bytes) -> Option<Result<Request>> {
    let parser: fn(bytes::Bytes) -> Result<Request> = match command_code {
        b"A0" => parsers::parse_a0,
        b"BU" => parsers::parse_bu,
        b"CA" => parsers::parse_ca,
        b"CW" => parsers::parse_cw,
        b"CY" => parsers::parse_cy,
        b"DC" => parsers::parse_dc,
        b"EC" => parsers::parse_ec,
        b"FA" => parsers::parse_fa,
        b"HC" => parsers::parse_hc,
        b"NC" => parsers::parse_nc,
        _ => return None,
    };
    Some(parser(body))
}
