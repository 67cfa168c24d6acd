//! Value catalog for UTF table entries
//!
//! Every entry of a UTF table starts with a tag byte packing two things:
//! the low five bits select the value type (0x10..=0x1B) and the top three
//! bits select where the value is stored (`0x20` shared/recurring,
//! `0x40` per-row/unique). A bare base tag without storage bits is read as
//! recurring.

use crate::error::UsmError;
use alloc::string::String;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

const TYPE_MASK: u8 = 0x1F;
const STORAGE_MASK: u8 = 0xE0;
const STORAGE_RECURRING: u8 = 0x20;
const STORAGE_UNIQUE: u8 = 0x40;

/// Semantic type of a table value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Signed 8-bit integer
    Char,
    /// Unsigned 8-bit integer
    UnsignedChar,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 16-bit integer
    UnsignedShort,
    /// Signed 32-bit integer
    Integer,
    /// Unsigned 32-bit integer
    UnsignedInteger,
    /// Signed 64-bit integer
    LongLong,
    /// Unsigned 64-bit integer
    UnsignedLongLong,
    /// IEEE-754 single precision
    Float,
    /// IEEE-754 double precision
    Double,
    /// Offset into the string region
    String,
    /// Start/end offsets into the byte region
    Bytes,
}

/// How the bytes of a value are to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Numeric {
    /// Two's complement integer
    Signed,
    /// Unsigned integer
    Unsigned,
    /// IEEE-754 float
    Float,
    /// Offset(s) into another region
    Reference,
}

/// One row of the static value catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Base tag byte
    pub tag: u8,
    /// Value type
    pub value_type: ValueType,
    /// Display name
    pub name: &'static str,
    /// Stored width in bytes
    pub width: usize,
    /// Interpretation of the stored bytes
    pub numeric: Numeric,
}

/// The value catalog, indexed by `base tag - 0x10`
#[rustfmt::skip]
pub static CATALOG: [CatalogEntry; 12] = [
    CatalogEntry { tag: 0x10, value_type: ValueType::Char, name: "Char", width: 1, numeric: Numeric::Signed },
    CatalogEntry { tag: 0x11, value_type: ValueType::UnsignedChar, name: "Unsigned Char", width: 1, numeric: Numeric::Unsigned },
    CatalogEntry { tag: 0x12, value_type: ValueType::Short, name: "Short", width: 2, numeric: Numeric::Signed },
    CatalogEntry { tag: 0x13, value_type: ValueType::UnsignedShort, name: "Unsigned Short", width: 2, numeric: Numeric::Unsigned },
    CatalogEntry { tag: 0x14, value_type: ValueType::Integer, name: "Integer", width: 4, numeric: Numeric::Signed },
    CatalogEntry { tag: 0x15, value_type: ValueType::UnsignedInteger, name: "Unsigned Integer", width: 4, numeric: Numeric::Unsigned },
    CatalogEntry { tag: 0x16, value_type: ValueType::LongLong, name: "Long long", width: 8, numeric: Numeric::Signed },
    CatalogEntry { tag: 0x17, value_type: ValueType::UnsignedLongLong, name: "Unsigned long long", width: 8, numeric: Numeric::Unsigned },
    CatalogEntry { tag: 0x18, value_type: ValueType::Float, name: "Float", width: 4, numeric: Numeric::Float },
    CatalogEntry { tag: 0x19, value_type: ValueType::Double, name: "Double", width: 8, numeric: Numeric::Float },
    CatalogEntry { tag: 0x1A, value_type: ValueType::String, name: "String", width: 4, numeric: Numeric::Reference },
    CatalogEntry { tag: 0x1B, value_type: ValueType::Bytes, name: "Bytes", width: 4, numeric: Numeric::Reference },
];

impl ValueType {
    /// Catalog row for this type
    pub fn entry(&self) -> &'static CatalogEntry {
        &CATALOG[*self as usize]
    }

    /// Look up a base tag (0x10..=0x1B)
    pub fn from_base_tag(tag: u8) -> Option<Self> {
        tag.checked_sub(0x10)
            .and_then(|index| CATALOG.get(index as usize))
            .map(|entry| entry.value_type)
    }

    /// Base tag byte
    pub fn base_tag(&self) -> u8 {
        self.entry().tag
    }

    /// Stored width in bytes. Bytes values store two fields of this width.
    pub fn width(&self) -> usize {
        self.entry().width
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        self.entry().name
    }
}

/// Where a value is physically stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Storage {
    /// Stored once in the shared region and applied to every row
    Recurring,
    /// Stored once per row in the unique region
    Unique,
}

impl Storage {
    /// Storage class named by the top bits of a raw tag byte
    ///
    /// Anything other than the unique bit reads as recurring.
    pub const fn of_tag(byte: u8) -> Self {
        if byte & STORAGE_MASK == STORAGE_UNIQUE {
            Storage::Unique
        } else {
            Storage::Recurring
        }
    }
}

/// A decoded tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeTag {
    /// Value type
    pub value_type: ValueType,
    /// Storage class
    pub storage: Storage,
}

impl TypeTag {
    /// Create a tag
    pub const fn new(value_type: ValueType, storage: Storage) -> Self {
        Self {
            value_type,
            storage,
        }
    }

    /// Split a raw tag byte into type and storage
    ///
    /// Returns `None` for storage bits other than none/recurring/unique or an
    /// unknown base type.
    pub fn decode(byte: u8) -> Option<Self> {
        let storage = match byte & STORAGE_MASK {
            0 | STORAGE_RECURRING => Storage::Recurring,
            STORAGE_UNIQUE => Storage::Unique,
            _ => return None,
        };
        ValueType::from_base_tag(byte & TYPE_MASK).map(|value_type| Self::new(value_type, storage))
    }

    /// Pack into a raw tag byte
    pub fn encode(&self) -> u8 {
        let storage = match self.storage {
            Storage::Recurring => STORAGE_RECURRING,
            Storage::Unique => STORAGE_UNIQUE,
        };
        self.value_type.base_tag() | storage
    }
}

/// A typed table value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Signed 8-bit integer
    Char(i8),
    /// Unsigned 8-bit integer
    UnsignedChar(u8),
    /// Signed 16-bit integer
    Short(i16),
    /// Unsigned 16-bit integer
    UnsignedShort(u16),
    /// Signed 32-bit integer
    Integer(i32),
    /// Unsigned 32-bit integer
    UnsignedInteger(u32),
    /// Signed 64-bit integer
    LongLong(i64),
    /// Unsigned 64-bit integer
    UnsignedLongLong(u64),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// String resolved from the string region
    String(String),
    /// Blob resolved from the byte region
    Bytes(#[serde(serialize_with = "serialize_blob")] Bytes),
    /// Entry whose tag is not in the catalog; holds the raw tag and no data
    Unknown(u8),
}

fn serialize_blob<S: serde::Serializer>(blob: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(blob.iter())
}

impl Value {
    /// Type of this value, `None` for [`Value::Unknown`]
    pub const fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Value::Char(_) => ValueType::Char,
            Value::UnsignedChar(_) => ValueType::UnsignedChar,
            Value::Short(_) => ValueType::Short,
            Value::UnsignedShort(_) => ValueType::UnsignedShort,
            Value::Integer(_) => ValueType::Integer,
            Value::UnsignedInteger(_) => ValueType::UnsignedInteger,
            Value::LongLong(_) => ValueType::LongLong,
            Value::UnsignedLongLong(_) => ValueType::UnsignedLongLong,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Unknown(_) => return None,
        })
    }

    /// Decode a fixed-width numeric value from big-endian bytes
    ///
    /// `raw` must be exactly `value_type.width()` bytes. String and Bytes
    /// are references and are resolved by the table codec instead.
    pub fn from_be_bytes(value_type: ValueType, raw: &[u8]) -> Result<Self, UsmError> {
        fn array<const N: usize>(raw: &[u8]) -> Result<[u8; N], UsmError> {
            raw.try_into().map_err(|_| {
                UsmError::CorruptTable(alloc::format!(
                    "expected {} value bytes, got {}",
                    N,
                    raw.len()
                ))
            })
        }

        Ok(match value_type {
            ValueType::Char => Value::Char(i8::from_be_bytes(array(raw)?)),
            ValueType::UnsignedChar => Value::UnsignedChar(u8::from_be_bytes(array(raw)?)),
            ValueType::Short => Value::Short(i16::from_be_bytes(array(raw)?)),
            ValueType::UnsignedShort => Value::UnsignedShort(u16::from_be_bytes(array(raw)?)),
            ValueType::Integer => Value::Integer(i32::from_be_bytes(array(raw)?)),
            ValueType::UnsignedInteger => Value::UnsignedInteger(u32::from_be_bytes(array(raw)?)),
            ValueType::LongLong => Value::LongLong(i64::from_be_bytes(array(raw)?)),
            ValueType::UnsignedLongLong => {
                Value::UnsignedLongLong(u64::from_be_bytes(array(raw)?))
            }
            ValueType::Float => Value::Float(f32::from_be_bytes(array(raw)?)),
            ValueType::Double => Value::Double(f64::from_be_bytes(array(raw)?)),
            ValueType::String | ValueType::Bytes => {
                return Err(UsmError::InvalidStructure(alloc::format!(
                    "{} values are references, not inline numbers",
                    value_type.name()
                )))
            }
        })
    }

    /// Append the big-endian bytes of a numeric value
    ///
    /// Returns `false` for String, Bytes and Unknown, which are not inline.
    pub fn put_be_bytes(&self, out: &mut alloc::vec::Vec<u8>) -> bool {
        match self {
            Value::Char(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::UnsignedChar(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::UnsignedShort(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::UnsignedInteger(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::LongLong(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::UnsignedLongLong(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::String(_) | Value::Bytes(_) | Value::Unknown(_) => return false,
        }
        true
    }

    /// Unsigned view of integer values, if they fit
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UnsignedChar(v) => Some(v.into()),
            Value::UnsignedShort(v) => Some(v.into()),
            Value::UnsignedInteger(v) => Some(v.into()),
            Value::UnsignedLongLong(v) => Some(v),
            Value::Char(v) => u64::try_from(v).ok(),
            Value::Short(v) => u64::try_from(v).ok(),
            Value::Integer(v) => u64::try_from(v).ok(),
            Value::LongLong(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// String view of String values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Char(v) => write!(f, "{}", v),
            Value::UnsignedChar(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::UnsignedShort(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::UnsignedInteger(v) => write!(f, "{}", v),
            Value::LongLong(v) => write!(f, "{}", v),
            Value::UnsignedLongLong(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:.6}", v),
            Value::Double(v) => write!(f, "{:.6}", v),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => {
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Unknown(tag) => write!(f, "<unknown tag 0x{:02x}>", tag),
        }
    }
}
