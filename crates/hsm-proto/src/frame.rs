//! Length-prefixed wire framing.
//!
//! On the wire: a 2-byte big-endian length `L`, followed by `L` bytes of
//! payload. The payload is 4 bytes of opaque header (echoed verbatim by the
//! server) followed by a 2-byte ASCII command code and a command-specific
//! body.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Header length in bytes (opaque, echoed verbatim).
pub const HEADER_LEN: usize = 4;

/// Command code length in bytes.
pub const CODE_LEN: usize = 2;

/// Recommended upper bound on a frame's declared length.
pub const MAX_FRAME_LEN: usize = 4096;

/// Read one length-prefixed frame from `conn`.
///
/// Reads exactly 2 bytes for the length prefix, then exactly that many
/// payload bytes. Returns the full frame, prefix included, so callers can
/// trace by length.
///
/// # Errors
///
/// - [`ProtocolError::PeerClosed`] if the stream ends before either read
///   completes.
/// - [`ProtocolError::FrameTooShort`] if the declared length exceeds
///   [`MAX_FRAME_LEN`].
pub async fn read_frame<R: AsyncReadExt + Unpin>(conn: &mut R) -> Result<Bytes> {
    let mut len_buf = [0u8; 2];
    conn.read_exact(&mut len_buf).await.map_err(|_| ProtocolError::PeerClosed)?;
    let length = u16::from_be_bytes(len_buf) as usize;

    if length > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooShort { length, max: MAX_FRAME_LEN });
    }

    let mut body = vec![0u8; length];
    conn.read_exact(&mut body).await.map_err(|_| ProtocolError::PeerClosed)?;

    let mut frame = Vec::with_capacity(2 + length);
    frame.extend_from_slice(&len_buf);
    frame.extend_from_slice(&body);
    Ok(Bytes::from(frame))
}

/// Write one length-prefixed frame (`header` + `body`) to `conn`.
///
/// Emits `be16(len(header) + len(body)) ++ header ++ body`. If `header` is
/// empty, the length covers only `body`, preserving compatibility with
/// headerless clients.
///
/// # Errors
///
/// Propagates any I/O error from the underlying writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    conn: &mut W,
    header: &[u8],
    body: &[u8],
) -> std::io::Result<()> {
    let total_len = (header.len() + body.len()) as u16;
    conn.write_all(&total_len.to_be_bytes()).await?;
    if !header.is_empty() {
        conn.write_all(header).await?;
    }
    conn.write_all(body).await?;
    conn.flush().await
}

/// A parsed frame: the opaque header, the 2-byte command code, and the
/// command-specific body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFrame {
    /// The 4-byte opaque header, echoed verbatim in the response.
    pub header: [u8; HEADER_LEN],
    /// The 2-byte ASCII command code.
    pub command_code: [u8; CODE_LEN],
    /// The command-specific body.
    pub body: Bytes,
}

/// Split a full frame (length prefix included) into header, command code,
/// and body.
///
/// # Errors
///
/// - [`ProtocolError::LengthMismatch`] if the prefix disagrees with the
///   payload length.
/// - [`ProtocolError::Truncated`] if the payload is shorter than the 6 bytes
///   of header plus command code.
pub fn split_frame(bytes: &Bytes) -> Result<SplitFrame> {
    if bytes.len() < 2 {
        return Err(ProtocolError::Truncated { actual: 0 });
    }
    let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let payload = &bytes[2..];

    if declared != payload.len() {
        return Err(ProtocolError::LengthMismatch { declared, actual: payload.len() });
    }

    if payload.len() < HEADER_LEN + CODE_LEN {
        return Err(ProtocolError::Truncated { actual: payload.len() });
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&payload[..HEADER_LEN]);

    let mut command_code = [0u8; CODE_LEN];
    command_code.copy_from_slice(&payload[HEADER_LEN..HEADER_LEN + CODE_LEN]);

    let body = bytes.slice(2 + HEADER_LEN + CODE_LEN..);

    Ok(SplitFrame { header, command_code, body })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn assemble(header: [u8; 4], code: [u8; 2], body: &[u8]) -> Bytes {
        let mut payload = Vec::with_capacity(HEADER_LEN + CODE_LEN + body.len());
        payload.extend_from_slice(&header);
        payload.extend_from_slice(&code);
        payload.extend_from_slice(body);
        let len = payload.len() as u16;
        let mut frame = Vec::with_capacity(2 + payload.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&payload);
        Bytes::from(frame)
    }

    #[tokio::test]
    async fn read_frame_roundtrips_with_write_frame() {
        let header = *b"HDR1";
        let code = *b"NC";
        let body: &[u8] = b"";
        let mut payload = Vec::new();
        payload.extend_from_slice(&code);
        payload.extend_from_slice(body);

        let mut wire = Vec::new();
        write_frame(&mut wire, &header, &payload).await.unwrap();

        let mut cursor = std::io::Cursor::new(wire);
        let frame = read_frame(&mut cursor).await.unwrap();
        let split = split_frame(&frame).unwrap();

        assert_eq!(split.header, header);
        assert_eq!(split.command_code, code);
        assert_eq!(split.body.as_ref(), body);
    }

    #[test]
    fn split_frame_rejects_length_mismatch() {
        let mut frame = assemble(*b"HDR1", *b"NC", b"").to_vec();
        // Corrupt the declared length.
        frame[1] = 0xFF;
        let err = split_frame(&Bytes::from(frame)).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthMismatch { .. }));
    }

    #[test]
    fn split_frame_rejects_truncated_payload() {
        let frame = Bytes::from(vec![0x00, 0x03, b'H', b'D', b'R']);
        let err = split_frame(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }

    proptest! {
        #[test]
        fn split_frame_reconstructs_original(
            header in proptest::array::uniform4(any::<u8>()),
            code in proptest::array::uniform2(any::<u8>()),
            body in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let frame = assemble(header, code, &body);
            let split = split_frame(&frame).unwrap();

            let mut rebuilt_payload = Vec::new();
            rebuilt_payload.extend_from_slice(&split.header);
            rebuilt_payload.extend_from_slice(&split.command_code);
            rebuilt_payload.extend_from_slice(&split.body);

            let len = rebuilt_payload.len() as u16;
            let mut rebuilt = Vec::new();
            rebuilt.extend_from_slice(&len.to_be_bytes());
            rebuilt.extend_from_slice(&rebuilt_payload);

            prop_assert_eq!(Bytes::from(rebuilt), frame);
        }
    }
}
