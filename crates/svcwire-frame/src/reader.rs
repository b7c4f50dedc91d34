use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use svcwire_transport::Stream;
use tracing::{debug, trace};

use crate::envelope::{decode_envelope, Envelope, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete envelopes from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete envelopes.
/// Bytes of a partially received envelope stay buffered across calls, so a
/// read that fails with a timeout can simply be retried.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, both
    /// between envelopes and in the middle of one.
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        loop {
            match decode_envelope(&mut self.buf, self.config.max_payload_size) {
                Ok(Some(envelope)) => {
                    trace!(
                        id = envelope.id,
                        kind = envelope.kind.name(),
                        len = envelope.payload.len(),
                        "envelope read"
                    );
                    return Ok(envelope);
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(error = %err, buffered = self.buf.len(), "rejecting envelope");
                    return Err(err);
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of bytes received but not yet returned as an envelope.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<Stream> {
    /// Create a frame reader for a [`Stream`] and apply read timeout from config.
    pub fn with_config_stream(inner: Stream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: svcwire_transport::TransportError) -> FrameError {
    match err {
        svcwire_transport::TransportError::Io(io) => FrameError::Io(io),
        svcwire_transport::TransportError::Connect { source, .. }
        | svcwire_transport::TransportError::Resolve { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::envelope::{encode_envelope, Kind};

    #[test]
    fn read_single_envelope() {
        let mut wire = BytesMut::new();
        encode_envelope(1, Kind::Request, b"hello", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let env = reader.read_envelope().unwrap();

        assert_eq!(env.id, 1);
        assert_eq!(env.kind, Kind::Request);
        assert_eq!(env.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_envelopes() {
        let mut wire = BytesMut::new();
        encode_envelope(1, Kind::Reply, b"one", &mut wire).unwrap();
        encode_envelope(2, Kind::Reply, b"two", &mut wire).unwrap();
        encode_envelope(3, Kind::Error, b"three", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));

        let e1 = reader.read_envelope().unwrap();
        let e2 = reader.read_envelope().unwrap();
        let e3 = reader.read_envelope().unwrap();

        assert_eq!((e1.id, e1.payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!((e2.id, e2.payload.as_ref()), (2, b"two".as_ref()));
        assert_eq!((e3.id, e3.kind), (3, Kind::Error));
    }

    #[test]
    fn read_envelope_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut wire = BytesMut::new();
        encode_envelope(9, Kind::Reply, &payload, &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let env = reader.read_envelope().unwrap();

        assert_eq!(env.id, 9);
        assert_eq!(env.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_envelope(4, Kind::Request, b"slow", &mut wire).unwrap();

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let env = reader.read_envelope().unwrap();
        assert_eq!(env.id, 4);
        assert_eq!(env.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u32_le(5 + 16);
        partial.put_u32_le(2);
        partial.put_u8(Kind::Reply as u8);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn unknown_kind_in_stream() {
        let bytes = vec![0x05, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x7F];
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind(0x7F)));
    }

    #[test]
    fn oversized_envelope_in_stream() {
        let mut wire = BytesMut::new();
        wire.put_u32_le(5 + 1024);
        wire.put_u32_le(1);
        wire.put_u8(Kind::Request as u8);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(1, Kind::Request, b"ping").unwrap();
        let env = reader.read_envelope().unwrap();

        assert_eq!(env.id, 1);
        assert_eq!(env.payload.as_ref(), b"ping");
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let reader = Arc::new(Mutex::new(FrameReader::new(right)));

        let reader_thread = {
            let reader = Arc::clone(&reader);
            std::thread::spawn(move || {
                for expected in 0..64u32 {
                    let env = reader.lock().unwrap().read_envelope().unwrap();
                    assert_eq!(env.id, expected);
                    assert_eq!(env.payload.as_ref(), format!("msg-{expected}").as_bytes());
                }
            })
        };

        for i in 0..64u32 {
            let payload = format!("msg-{i}");
            writer.send(i, Kind::Request, payload.as_bytes()).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn read_would_block_keeps_partial_data() {
        let mut wire = BytesMut::new();
        encode_envelope(7, Kind::Reply, b"ok", &mut wire).unwrap();

        let reader = WouldBlockMidFrame {
            blocked: false,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
        assert_eq!(framed.buffered(), 4);

        let env = framed.read_envelope().unwrap();
        assert_eq!(env.id, 7);
        assert_eq!(env.payload.as_ref(), b"ok");
    }

    /// Hands out the length prefix, then one `WouldBlock`, then the rest.
    struct WouldBlockMidFrame {
        blocked: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockMidFrame {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos == 4 && !self.blocked {
                self.blocked = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let end = if self.pos < 4 { 4 } else { self.bytes.len() };
            let n = (end - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_envelope(8, Kind::Reply, b"ok", &mut wire).unwrap();

        let reader = InterruptedThenData {
            state: 0,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let env = framed.read_envelope().unwrap();

        assert_eq!(env.id, 8);
        assert_eq!(env.payload.as_ref(), b"ok");
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn accessors() {
        let reader = FrameReader::new(Cursor::new(vec![1u8, 2, 3]));
        assert_eq!(reader.get_ref().get_ref().len(), 3);
        assert_eq!(reader.config().max_payload_size, crate::DEFAULT_MAX_PAYLOAD);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn applies_read_timeout_for_stream() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let mut reader = FrameReader::with_config_stream(Stream::from(left), cfg).unwrap();
        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut
        ));
    }
}
