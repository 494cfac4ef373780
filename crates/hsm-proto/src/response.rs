//! Response builder (C3).
//!
//! Accumulates named fields in insertion order and emits a length-prefixed
//! frame. Field names exist only for traceability — nothing on the wire
//! carries them.

use bytes::{Bytes, BytesMut};

use crate::frame::write_frame;

/// Builds an outgoing response frame.
///
/// The response code is set first (and thus emitted first), followed by the
/// error code, followed by any command-specific fields, exactly as spec'd:
/// values are concatenated in the order they were set.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    header: [u8; 4],
    fields: Vec<(&'static str, Bytes)>,
}

impl ResponseBuilder {
    /// Start a new response echoing the given request header.
    #[must_use]
    pub fn new(header: [u8; 4]) -> Self {
        Self { header, fields: Vec::new() }
    }

    /// Set the 2-character ASCII response code. Must be the first field set.
    pub fn set_response_code(&mut self, code: &[u8; 2]) -> &mut Self {
        self.fields.push(("Response Code", Bytes::copy_from_slice(code)));
        self
    }

    /// Set the 2-character ASCII error code.
    pub fn set_error_code(&mut self, code: &[u8; 2]) -> &mut Self {
        self.fields.push(("Error Code", Bytes::copy_from_slice(code)));
        self
    }

    /// Append a named field's raw bytes.
    pub fn set(&mut self, name: &'static str, value: impl Into<Bytes>) -> &mut Self {
        self.fields.push((name, value.into()));
        self
    }

    /// Ordered field list, for tracing.
    #[must_use]
    pub fn fields(&self) -> &[(&'static str, Bytes)] {
        &self.fields
    }

    /// Concatenate all field values in insertion order.
    #[must_use]
    pub fn body(&self) -> Bytes {
        let total: usize = self.fields.iter().map(|(_, v)| v.len()).sum();
        let mut buf = BytesMut::with_capacity(total);
        for (_, value) in &self.fields {
            buf.extend_from_slice(value);
        }
        buf.freeze()
    }

    /// Write the complete length-prefixed frame to `conn`.
    pub async fn write<W: tokio::io::AsyncWriteExt + Unpin>(
        &self,
        conn: &mut W,
    ) -> std::io::Result<()> {
        write_frame(conn, &self.header, &self.body()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn body_concatenates_in_insertion_order() {
        let mut r = ResponseBuilder::new(*b"HDR1");
        r.set_response_code(b"ND").set_error_code(b"00").set("Firmware Version", Bytes::from_static(b"0007-E000"));

        assert_eq!(r.body().as_ref(), b"ND000007-E000");
        assert_eq!(r.fields()[0].0, "Response Code");
        assert_eq!(r.fields()[1].0, "Error Code");
    }
}
