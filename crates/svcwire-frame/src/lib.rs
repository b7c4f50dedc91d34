//! Typed message codec and envelope framing.
//!
//! Two layers live here:
//! - [`message`]: a [`Message`] is an ordered list of typed fields. Each
//!   field is written as a one byte type tag followed by its payload, with a
//!   4-byte little-endian length in front of variable length payloads.
//! - [`envelope`]: every unit on the wire is an [`Envelope`] carrying a
//!   correlation id, a kind (request, reply, error) and an encoded message,
//!   prefixed by its length so readers can frame it without parsing fields.
//!
//! [`FrameReader`] and [`FrameWriter`] move whole envelopes over any blocking
//! `Read` / `Write` stream. The `async` feature adds a tokio codec.

#[cfg(feature = "async")]
pub mod codec;
pub mod envelope;
pub mod error;
pub mod message;
pub mod reader;
pub mod types;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::EnvelopeCodec;
pub use envelope::{
    decode_envelope, encode_envelope, Envelope, FrameConfig, Kind, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE,
};
pub use error::{CodecError, FrameError, Result};
pub use message::{decode_message, encode_fields, encode_message, Message, Value};
pub use reader::FrameReader;
pub use types::{format_tags, TypeTag};
pub use writer::FrameWriter;
