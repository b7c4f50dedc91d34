use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::types::TypeTag;

/// Length prefix in front of variable-length field payloads.
const FIELD_LENGTH_SIZE: usize = 4;

/// A single typed field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Raw(Bytes),
}

impl Value {
    /// The registry tag of this value.
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Bool(_) => TypeTag::Bool,
            Value::Int8(_) => TypeTag::Int8,
            Value::UInt8(_) => TypeTag::UInt8,
            Value::Int16(_) => TypeTag::Int16,
            Value::UInt16(_) => TypeTag::UInt16,
            Value::Int32(_) => TypeTag::Int32,
            Value::UInt32(_) => TypeTag::UInt32,
            Value::Int64(_) => TypeTag::Int64,
            Value::UInt64(_) => TypeTag::UInt64,
            Value::Float(_) => TypeTag::Float,
            Value::Double(_) => TypeTag::Double,
            Value::String(_) => TypeTag::String,
            Value::Raw(_) => TypeTag::Raw,
        }
    }

    /// Convert command-line style text into a value of the given type.
    ///
    /// Booleans accept `true`/`false`/`1`/`0`; raw fields take the UTF-8
    /// bytes of the text verbatim.
    pub fn parse_as(tag: TypeTag, text: &str) -> Result<Value, CodecError> {
        let invalid = || CodecError::InvalidValue {
            tag,
            text: text.to_string(),
        };
        let value = match tag {
            TypeTag::Bool => match text {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(invalid()),
            },
            TypeTag::Int8 => Value::Int8(text.parse().map_err(|_| invalid())?),
            TypeTag::UInt8 => Value::UInt8(text.parse().map_err(|_| invalid())?),
            TypeTag::Int16 => Value::Int16(text.parse().map_err(|_| invalid())?),
            TypeTag::UInt16 => Value::UInt16(text.parse().map_err(|_| invalid())?),
            TypeTag::Int32 => Value::Int32(text.parse().map_err(|_| invalid())?),
            TypeTag::UInt32 => Value::UInt32(text.parse().map_err(|_| invalid())?),
            TypeTag::Int64 => Value::Int64(text.parse().map_err(|_| invalid())?),
            TypeTag::UInt64 => Value::UInt64(text.parse().map_err(|_| invalid())?),
            TypeTag::Float => Value::Float(text.parse().map_err(|_| invalid())?),
            TypeTag::Double => Value::Double(text.parse().map_err(|_| invalid())?),
            TypeTag::String => Value::String(text.to_string()),
            TypeTag::Raw => Value::Raw(Bytes::copy_from_slice(text.as_bytes())),
        };
        Ok(value)
    }

    /// Bytes this value occupies on the wire, tag included.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Value::String(s) => FIELD_LENGTH_SIZE + s.len(),
            Value::Raw(b) => FIELD_LENGTH_SIZE + b.len(),
            other => other.tag().fixed_width().unwrap_or(0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Raw(v) => match std::str::from_utf8(v) {
                Ok(text) => f.write_str(text),
                Err(_) => write!(f, "<binary {} bytes>", v.len()),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Raw(v)
    }
}

/// An ordered sequence of typed fields with a read cursor.
///
/// Writes append; reads consume fields front to back and must ask for the
/// same type that was written. Equality compares fields only.
#[derive(Debug, Clone, Default)]
pub struct Message {
    fields: Vec<Value>,
    cursor: usize,
}

macro_rules! scalar_accessors {
    ($($variant:ident($ty:ty) => $write:ident, $read:ident;)*) => {
        $(
            #[doc = concat!("Append a `", stringify!($ty), "` field.")]
            pub fn $write(&mut self, value: $ty) -> &mut Self {
                self.push(Value::$variant(value))
            }

            #[doc = concat!("Read the next field as `", stringify!($ty), "`.")]
            pub fn $read(&mut self) -> Result<$ty, CodecError> {
                self.take(TypeTag::$variant, |value| match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                })
            }
        )*
    };
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message from a list of fields.
    pub fn with_fields(fields: impl IntoIterator<Item = Value>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            cursor: 0,
        }
    }

    /// Append a field.
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        self.fields.push(value.into());
        self
    }

    scalar_accessors! {
        Bool(bool) => write_bool, read_bool;
        Int8(i8) => write_i8, read_i8;
        UInt8(u8) => write_u8, read_u8;
        Int16(i16) => write_i16, read_i16;
        UInt16(u16) => write_u16, read_u16;
        Int32(i32) => write_i32, read_i32;
        UInt32(u32) => write_u32, read_u32;
        Int64(i64) => write_i64, read_i64;
        UInt64(u64) => write_u64, read_u64;
        Float(f32) => write_f32, read_f32;
        Double(f64) => write_f64, read_f64;
    }

    /// Append a string field.
    pub fn write_string(&mut self, value: impl Into<String>) -> &mut Self {
        self.push(Value::String(value.into()))
    }

    /// Read the next field as a string.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        self.take(TypeTag::String, |value| match value {
            Value::String(v) => Some(v.clone()),
            _ => None,
        })
    }

    /// Append a raw bytes field.
    pub fn write_raw(&mut self, value: impl Into<Bytes>) -> &mut Self {
        self.push(Value::Raw(value.into()))
    }

    /// Read the next field as raw bytes.
    pub fn read_raw(&mut self) -> Result<Bytes, CodecError> {
        self.take(TypeTag::Raw, |value| match value {
            Value::Raw(v) => Some(v.clone()),
            _ => None,
        })
    }

    /// Read the next field whatever its type.
    pub fn read_value(&mut self) -> Result<Value, CodecError> {
        let value = self
            .fields
            .get(self.cursor)
            .cloned()
            .ok_or(CodecError::EndOfMessage {
                len: self.fields.len(),
            })?;
        self.cursor += 1;
        Ok(value)
    }

    /// Move the read cursor back to the first field.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Number of fields not yet read.
    pub fn remaining(&self) -> usize {
        self.fields.len() - self.cursor
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.fields.iter()
    }

    /// The type tag of every field, in order.
    pub fn tags(&self) -> Vec<TypeTag> {
        self.fields.iter().map(Value::tag).collect()
    }

    /// Bytes the encoded message occupies.
    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(Value::encoded_len).sum()
    }

    /// Encode all fields; see [`encode_message`].
    pub fn encode(&self) -> Bytes {
        encode_message(self)
    }

    /// Decode a message; see [`decode_message`].
    pub fn decode(src: &[u8]) -> Result<Self, CodecError> {
        decode_message(src)
    }

    fn take<T>(
        &mut self,
        expected: TypeTag,
        extract: impl FnOnce(&Value) -> Option<T>,
    ) -> Result<T, CodecError> {
        let index = self.cursor;
        let value = self.fields.get(index).ok_or(CodecError::EndOfMessage {
            len: self.fields.len(),
        })?;
        match extract(value) {
            Some(out) => {
                self.cursor += 1;
                Ok(out)
            }
            None => Err(CodecError::TypeMismatch {
                index,
                expected,
                found: value.tag(),
            }),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl FromIterator<Value> for Message {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::with_fields(iter)
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Encode a message into its field wire format.
///
/// ```text
/// ┌─────────┬──────────────────────┬─────────┬─────
/// │ Tag (1) │ Payload              │ Tag (1) │ ...
/// │ 's'     │ Len (4B LE) + UTF-8  │ 'i'     │
/// └─────────┴──────────────────────┴─────────┴─────
/// ```
///
/// Pure function of the field sequence; the read cursor is ignored.
pub fn encode_message(message: &Message) -> Bytes {
    let mut dst = BytesMut::with_capacity(message.encoded_len());
    encode_fields(message.fields(), &mut dst);
    dst.freeze()
}

/// Append the wire form of `fields` to `dst`.
///
/// String and raw lengths are written as `u32`; fields longer than
/// `u32::MAX` bytes cannot be represented and trip a debug assertion.
pub fn encode_fields(fields: &[Value], dst: &mut BytesMut) {
    for value in fields {
        encode_value(value, dst);
    }
}

fn encode_value(value: &Value, dst: &mut BytesMut) {
    dst.reserve(value.encoded_len());
    dst.put_u8(value.tag().byte());
    match value {
        Value::Bool(v) => dst.put_u8(u8::from(*v)),
        Value::Int8(v) => dst.put_i8(*v),
        Value::UInt8(v) => dst.put_u8(*v),
        Value::Int16(v) => dst.put_i16_le(*v),
        Value::UInt16(v) => dst.put_u16_le(*v),
        Value::Int32(v) => dst.put_i32_le(*v),
        Value::UInt32(v) => dst.put_u32_le(*v),
        Value::Int64(v) => dst.put_i64_le(*v),
        Value::UInt64(v) => dst.put_u64_le(*v),
        Value::Float(v) => dst.put_f32_le(*v),
        Value::Double(v) => dst.put_f64_le(*v),
        Value::String(v) => {
            debug_assert!(
                u32::try_from(v.len()).is_ok(),
                "string field exceeds u32 length prefix"
            );
            dst.put_u32_le(v.len() as u32);
            dst.put_slice(v.as_bytes());
        }
        Value::Raw(v) => {
            debug_assert!(
                u32::try_from(v.len()).is_ok(),
                "raw field exceeds u32 length prefix"
            );
            dst.put_u32_le(v.len() as u32);
            dst.put_slice(v);
        }
    }
}

/// Decode a buffer holding zero or more encoded fields.
pub fn decode_message(src: &[u8]) -> Result<Message, CodecError> {
    let total = src.len();
    let mut buf = src;
    let mut fields = Vec::new();

    while buf.has_remaining() {
        let offset = total - buf.len();
        let tag_byte = buf.get_u8();
        let tag = TypeTag::from_byte(tag_byte).ok_or(CodecError::UnknownTypeTag {
            tag: tag_byte,
            offset,
        })?;

        let payload_len = match tag.fixed_width() {
            Some(width) => width,
            None => {
                ensure_remaining(&buf, FIELD_LENGTH_SIZE, total)?;
                buf.get_u32_le() as usize
            }
        };
        ensure_remaining(&buf, payload_len, total)?;

        let value = match tag {
            TypeTag::Bool => Value::Bool(buf.get_u8() != 0),
            TypeTag::Int8 => Value::Int8(buf.get_i8()),
            TypeTag::UInt8 => Value::UInt8(buf.get_u8()),
            TypeTag::Int16 => Value::Int16(buf.get_i16_le()),
            TypeTag::UInt16 => Value::UInt16(buf.get_u16_le()),
            TypeTag::Int32 => Value::Int32(buf.get_i32_le()),
            TypeTag::UInt32 => Value::UInt32(buf.get_u32_le()),
            TypeTag::Int64 => Value::Int64(buf.get_i64_le()),
            TypeTag::UInt64 => Value::UInt64(buf.get_u64_le()),
            TypeTag::Float => Value::Float(buf.get_f32_le()),
            TypeTag::Double => Value::Double(buf.get_f64_le()),
            TypeTag::String => {
                let at = total - buf.len();
                let text = std::str::from_utf8(&buf[..payload_len])
                    .map_err(|_| CodecError::InvalidUtf8 { offset: at })?
                    .to_string();
                buf.advance(payload_len);
                Value::String(text)
            }
            TypeTag::Raw => {
                let bytes = Bytes::copy_from_slice(&buf[..payload_len]);
                buf.advance(payload_len);
                Value::Raw(bytes)
            }
        };
        fields.push(value);
    }

    Ok(Message::with_fields(fields))
}

fn ensure_remaining(buf: &&[u8], needed: usize, total: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        return Err(CodecError::Truncated {
            offset: total - buf.len(),
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}
