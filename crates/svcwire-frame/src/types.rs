//! Type tag registry.
//!
//! Every scalar type has a single ASCII code. The same code is used as the
//! tag byte in front of each encoded field and as the argument code inside a
//! method signature such as `reply::(s)`.

use std::fmt;

/// A registered field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    Raw,
}

/// `(tag, code, name, fixed width)`; `None` width means length-prefixed.
const REGISTRY: [(TypeTag, char, &str, Option<usize>); 13] = [
    (TypeTag::Bool, 'b', "bool", Some(1)),
    (TypeTag::Int8, 'c', "int8", Some(1)),
    (TypeTag::UInt8, 'C', "uint8", Some(1)),
    (TypeTag::Int16, 'w', "int16", Some(2)),
    (TypeTag::UInt16, 'W', "uint16", Some(2)),
    (TypeTag::Int32, 'i', "int32", Some(4)),
    (TypeTag::UInt32, 'I', "uint32", Some(4)),
    (TypeTag::Int64, 'l', "int64", Some(8)),
    (TypeTag::UInt64, 'L', "uint64", Some(8)),
    (TypeTag::Float, 'f', "float", Some(4)),
    (TypeTag::Double, 'd', "double", Some(8)),
    (TypeTag::String, 's', "string", None),
    (TypeTag::Raw, 'r', "raw", None),
];

impl TypeTag {
    /// Look up a tag by its signature code.
    pub fn from_code(code: char) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(_, c, _, _)| *c == code)
            .map(|(tag, _, _, _)| *tag)
    }

    /// Look up a tag by its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte.is_ascii() {
            Self::from_code(byte as char)
        } else {
            None
        }
    }

    /// The signature code for this tag.
    pub fn code(self) -> char {
        self.entry().1
    }

    /// The wire byte for this tag.
    pub fn byte(self) -> u8 {
        self.code() as u8
    }

    /// Human-readable type name.
    pub fn name(self) -> &'static str {
        self.entry().2
    }

    /// Payload width for fixed-size types, `None` for length-prefixed ones.
    pub fn fixed_width(self) -> Option<usize> {
        self.entry().3
    }

    /// All registered tags, in registry order.
    pub fn all() -> impl Iterator<Item = TypeTag> {
        REGISTRY.iter().map(|(tag, _, _, _)| *tag)
    }

    fn entry(self) -> &'static (TypeTag, char, &'static str, Option<usize>) {
        // Every variant has exactly one registry row.
        REGISTRY
            .iter()
            .find(|(tag, _, _, _)| *tag == self)
            .unwrap_or(&REGISTRY[0])
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render tags as their concatenated codes, e.g. `[String, Int32]` -> `"si"`.
pub fn format_tags(tags: &[TypeTag]) -> String {
    tags.iter().map(|tag| tag.code()).collect()
}
