use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Length prefix (4) + correlation id (4) + kind (1) = 9 bytes.
pub const HEADER_SIZE: usize = 9;

/// Bytes counted by the length prefix before the payload starts.
const ID_AND_KIND: usize = 5;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// What an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// A call or directory lookup.
    Request = 1,
    /// A successful answer to the request with the same id.
    Reply = 2,
    /// A failure report for the request with the same id.
    Error = 3,
}

impl Kind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Kind::Request),
            2 => Some(Kind::Reply),
            3 => Some(Kind::Error),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Request => "request",
            Kind::Reply => "reply",
            Kind::Error => "error",
        }
    }
}

/// One framed unit of wire data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Correlation id linking a reply to its request.
    pub id: u32,
    pub kind: Kind,
    /// An encoded [`crate::Message`].
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(id: u32, kind: Kind, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            kind,
            payload: payload.into(),
        }
    }

    pub fn request(id: u32, payload: impl Into<Bytes>) -> Self {
        Self::new(id, Kind::Request, payload)
    }

    pub fn reply(id: u32, payload: impl Into<Bytes>) -> Self {
        Self::new(id, Kind::Reply, payload)
    }

    pub fn error(id: u32, payload: impl Into<Bytes>) -> Self {
        Self::new(id, Kind::Error, payload)
    }

    /// The total wire size of this envelope (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────┬─────────────────┐
/// │ Length       │ Correlation  │ Kind     │ Payload         │
/// │ (4B LE)      │ id (4B LE)   │ (1B)     │ (Length - 5 B)  │
/// └──────────────┴──────────────┴──────────┴─────────────────┘
/// ```
///
/// `Length` counts everything after itself.
pub fn encode_envelope(id: u32, kind: Kind, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let max = u32::MAX as usize - ID_AND_KIND;
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le((ID_AND_KIND + payload.len()) as u32);
    dst.put_u32_le(id);
    dst.put_u8(kind as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Decode an envelope from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// On success, consumes the envelope bytes from the buffer.
pub fn decode_envelope(src: &mut BytesMut, max_payload: usize) -> Result<Option<Envelope>> {
    if src.len() < 4 {
        return Ok(None); // Need more data
    }

    let length = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    if (length as usize) < ID_AND_KIND {
        return Err(FrameError::InvalidLength(length));
    }

    let payload_len = length as usize - ID_AND_KIND;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let kind = Kind::from_byte(src[8]).ok_or(FrameError::UnknownKind(src[8]))?;

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(4);
    let id = src.get_u32_le();
    src.advance(1);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Envelope { id, kind, payload }))
}

/// Configuration for the envelope codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, svcwire!";

        encode_envelope(7, Kind::Request, payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let env = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(env.id, 7);
        assert_eq!(env.kind, Kind::Request);
        assert_eq!(env.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_layout() {
        let mut buf = BytesMut::new();
        encode_envelope(0x0102_0304, Kind::Reply, b"ab", &mut buf).unwrap();
        assert_eq!(
            buf.as_ref(),
            &[7, 0, 0, 0, 0x04, 0x03, 0x02, 0x01, 2, b'a', b'b']
        );
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00][..]);
        assert!(decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());

        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00, 0x00, 0x01][..]);
        assert!(decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 5, "partial header must stay buffered");
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_envelope(1, Kind::Reply, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2); // Truncate payload

        let result = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_unknown_kind() {
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x09][..]);
        let result = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::UnknownKind(9))));
    }

    #[test]
    fn test_decode_length_shorter_than_header() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(3);
        buf.put_slice(&[0, 0, 0]);
        let result = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidLength(3))));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(1024 * 1024 * 32); // 32 MiB
        buf.put_u32_le(1);
        buf.put_u8(Kind::Request as u8);

        let result = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_envelopes() {
        let mut buf = BytesMut::new();
        encode_envelope(1, Kind::Request, b"first", &mut buf).unwrap();
        encode_envelope(2, Kind::Error, b"second", &mut buf).unwrap();

        let e1 = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!((e1.id, e1.kind), (1, Kind::Request));
        assert_eq!(e1.payload.as_ref(), b"first");

        let e2 = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!((e2.id, e2.kind), (2, Kind::Error));
        assert_eq!(e2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_envelope(0, Kind::Reply, b"", &mut buf).unwrap();

        let env = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(env.id, 0);
        assert!(env.payload.is_empty());
    }

    #[test]
    fn test_envelope_wire_size() {
        let env = Envelope::request(1, Bytes::from_static(b"test"));
        assert_eq!(env.wire_size(), HEADER_SIZE + 4);
        assert_eq!(env.kind.name(), "request");
    }
}
