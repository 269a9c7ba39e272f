//! Element type tags.

use std::fmt;

/// The type tag written before every element of a document.
///
/// Numeric values match the engine's own encoding so that documents built
/// by hand interoperate with stored ones.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// End of object marker.
    Eoo = 0x00,
    /// 64-bit IEEE 754 floating point.
    Double = 0x01,
    /// UTF-8 string.
    String = 0x02,
    /// Embedded document.
    Object = 0x03,
    /// Array, encoded as a document with decimal index keys.
    Array = 0x04,
    /// Binary blob with a subtype byte.
    Binary = 0x05,
    /// Deprecated undefined value.
    Undefined = 0x06,
    /// 12-byte object identifier.
    ObjectId = 0x07,
    /// Boolean.
    Boolean = 0x08,
    /// UTC datetime in milliseconds since the epoch.
    Date = 0x09,
    /// Null.
    Null = 0x0A,
    /// Regular expression (pattern and options).
    Regex = 0x0B,
    /// JavaScript code.
    Code = 0x0D,
    /// Symbol.
    Symbol = 0x0E,
    /// 32-bit signed integer.
    Int32 = 0x10,
    /// 64-bit signed integer.
    Int64 = 0x12,
}

impl ElementType {
    /// Every value-carrying type, in tag order.
    pub const ALL: [ElementType; 15] = [
        Self::Double,
        Self::String,
        Self::Object,
        Self::Array,
        Self::Binary,
        Self::Undefined,
        Self::ObjectId,
        Self::Boolean,
        Self::Date,
        Self::Null,
        Self::Regex,
        Self::Code,
        Self::Symbol,
        Self::Int32,
        Self::Int64,
    ];

    /// Looks up a tag byte.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x00 => Self::Eoo,
            0x01 => Self::Double,
            0x02 => Self::String,
            0x03 => Self::Object,
            0x04 => Self::Array,
            0x05 => Self::Binary,
            0x06 => Self::Undefined,
            0x07 => Self::ObjectId,
            0x08 => Self::Boolean,
            0x09 => Self::Date,
            0x0A => Self::Null,
            0x0B => Self::Regex,
            0x0D => Self::Code,
            0x0E => Self::Symbol,
            0x10 => Self::Int32,
            0x12 => Self::Int64,
            _ => return None,
        })
    }

    /// Returns the tag byte.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Returns the constant name the engine headers use for this tag.
    #[must_use]
    pub const fn constant_name(self) -> &'static str {
        match self {
            Self::Eoo => "BSON_EOO",
            Self::Double => "BSON_DOUBLE",
            Self::String => "BSON_STRING",
            Self::Object => "BSON_OBJECT",
            Self::Array => "BSON_ARRAY",
            Self::Binary => "BSON_BINDATA",
            Self::Undefined => "BSON_UNDEFINED",
            Self::ObjectId => "BSON_OID",
            Self::Boolean => "BSON_BOOL",
            Self::Date => "BSON_DATE",
            Self::Null => "BSON_NULL",
            Self::Regex => "BSON_REGEX",
            Self::Code => "BSON_CODE",
            Self::Symbol => "BSON_SYMBOL",
            Self::Int32 => "BSON_INT",
            Self::Int64 => "BSON_LONG",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.constant_name())
    }
}
