//! tokio-util codec for envelopes (feature `async`).

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::envelope::{decode_envelope, encode_envelope, Envelope, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Frames envelopes over any `AsyncRead + AsyncWrite` via `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_payload_size: usize,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        decode_envelope(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        match self.decode(src)? {
            Some(envelope) => Ok(Some(envelope)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<()> {
        if item.payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.max_payload_size,
            });
        }
        encode_envelope(item.id, item.kind, &item.payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::envelope::Kind;
    use crate::message::Message;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, EnvelopeCodec::new());
        let mut stream = FramedRead::new(server, EnvelopeCodec::new());

        let mut msg = Message::new();
        msg.write_string("reply::(s)").write_string("plaf");

        let writer = tokio::spawn(async move {
            sink.send(Envelope::request(1, msg.encode())).await.unwrap();
            sink.send(Envelope::reply(2, Message::new().encode()))
                .await
                .unwrap();
        });

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!((first.id, first.kind), (1, Kind::Request));
        let mut decoded = Message::decode(&first.payload).unwrap();
        assert_eq!(decoded.read_string().unwrap(), "reply::(s)");
        assert_eq!(decoded.read_string().unwrap(), "plaf");

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!((second.id, second.kind), (2, Kind::Reply));

        writer.await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn eof_mid_frame_is_connection_closed() {
        let mut codec = EnvelopeCodec::new();
        let mut buf = BytesMut::new();
        encode_envelope(1, Kind::Reply, b"abcdef", &mut buf).unwrap();
        buf.truncate(buf.len() - 2);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn encoder_enforces_max_payload() {
        let mut codec = EnvelopeCodec::with_max_payload(2);
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Envelope::request(1, &b"abc"[..]), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(dst.is_empty());
    }
}
