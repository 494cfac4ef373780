//! Dispatch (C6): map a command code to its parser and handler.
//!
//! Table-driven in spirit (spec.md §4.6) even though Rust expresses the
//! table as a `match` over [`Request`]'s variants rather than two
//! parallel hash maps — dispatch on an enum discriminant compiles to the
//! same jump table a code-to-function map would produce.

use bytes::Bytes;
use hsm_proto::request::Request;
use hsm_proto::ResponseBuilder;

use crate::error::Result;
use crate::{handlers, Hsm};

pub(crate) fn dispatch(hsm: &Hsm, header: [u8; 4], command_code: [u8; 2], body: Bytes) -> Result<ResponseBuilder> {
    let Some(parsed) = hsm_proto::parse(&command_code, body) else {
        return Ok(handlers::handle_unknown(header));
    };
    let request = parsed?;

    Ok(match request {
        Request::A0(f) => handlers::handle_a0(hsm, header, &f),
        Request::Bu(f) => handlers::handle_bu(hsm, header, &f),
        Request::Ca(f) => handlers::handle_ca(hsm, header, &f),
        Request::Cw(f) => handlers::handle_cw(hsm, header, &f)?,
        Request::Cy(f) => handlers::handle_cy(hsm, header, &f)?,
        Request::Dc(f) => handlers::handle_dc(hsm, header, &f),
        Request::Ec(f) => handlers::handle_ec(hsm, header, &f),
        Request::Fa(f) => handlers::handle_fa(hsm, header, &f),
        Request::Hc(f) => handlers::handle_hc(hsm, header, &f),
        Request::Nc => handlers::handle_nc(hsm, header),
    })
}
