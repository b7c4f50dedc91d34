use crate::types::TypeTag;

/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The declared length cannot even hold the envelope header.
    #[error("invalid envelope length {0} (must cover id and kind)")]
    InvalidLength(u32),

    /// The envelope kind byte is not request, reply or error.
    #[error("unknown envelope kind {0:#04x}")]
    UnknownKind(u8),

    /// An I/O error occurred while reading or writing envelopes.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete envelope was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors raised while decoding or reading typed message fields.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// A declared length or fixed width runs past the end of the buffer.
    #[error("truncated field at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// The field tag byte is not in the type registry.
    #[error("unknown type tag {tag:#04x} at offset {offset}")]
    UnknownTypeTag { tag: u8, offset: usize },

    /// A string field does not hold valid UTF-8.
    #[error("invalid utf-8 in string field at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A read went past the last field.
    #[error("no field left to read (message has {len} fields)")]
    EndOfMessage { len: usize },

    /// A read asked for a different type than the one written.
    #[error("field {index} is {found}, not {expected}")]
    TypeMismatch {
        index: usize,
        expected: TypeTag,
        found: TypeTag,
    },

    /// Text could not be converted into a value of the requested type.
    #[error("cannot read '{text}' as {tag}")]
    InvalidValue { tag: TypeTag, text: String },
}
