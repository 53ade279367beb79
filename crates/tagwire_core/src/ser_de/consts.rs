//! Shared constants between serialization and deserialization logic.
//!
//! Every encoded value starts with a single prefix byte so that its category can
//! be asserted during deserialization. The byte values below are a versioned
//! wire contract; changing any of them breaks interoperability.

/// Wire format version described by this module.
pub const WIRE_VERSION: u32 = 1;

pub const POSITIVE_FIXINT_MAX: u8 = 0x7f;
pub const PREFIX_FALSE: u8 = 0x80;
pub const PREFIX_TRUE: u8 = 0x81;
pub const PREFIX_NIL: u8 = 0x82;

pub const PREFIX_U8: u8 = 0x83;
pub const PREFIX_U16: u8 = 0x84;
pub const PREFIX_U32: u8 = 0x85;
pub const PREFIX_U64: u8 = 0x86;
pub const PREFIX_I8: u8 = 0x87;
pub const PREFIX_I16: u8 = 0x88;
pub const PREFIX_I32: u8 = 0x89;
pub const PREFIX_I64: u8 = 0x8a;
pub const PREFIX_F32: u8 = 0x8b;
pub const PREFIX_F64: u8 = 0x8c;

pub const PREFIX_STRING: u8 = 0x8d;
pub const PREFIX_BINARY: u8 = 0x8e;
pub const PREFIX_ARRAY: u8 = 0x8f;
pub const PREFIX_MAP: u8 = 0x90;
pub const PREFIX_STRUCTURE: u8 = 0x91;
pub const PREFIX_VARIANT: u8 = 0x92;
pub const PREFIX_HANDLE: u8 = 0x93;

pub const NEGATIVE_FIXINT_MIN: u8 = 0xe0;

/// Variant index written for an empty variant.
pub const EMPTY_VARIANT_INDEX: i64 = -1;

/// serde only hands out `u32` variant indices, this one stands in for [EMPTY_VARIANT_INDEX].
pub const EMPTY_VARIANT_INDEX_U32: u32 = u32::MAX;

/// Handle reference written for an empty handle.
pub const EMPTY_HANDLE_REFERENCE: i64 = -1;

/// Newtype name used to route [crate::types::Handle] through serde.
pub const HANDLE_TOKEN: &str = "$tagwire::private::Handle";

/// The decoded form of a prefix byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingByte {
    PositiveFixInt(u8),
    NegativeFixInt(i8),
    False,
    True,
    Nil,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Binary,
    Array,
    Map,
    Structure,
    Variant,
    Handle,
    Reserved(u8),
}

impl EncodingByte {
    pub const fn from_u8(b: u8) -> Self {
        match b {
            0x00..=POSITIVE_FIXINT_MAX => Self::PositiveFixInt(b),
            PREFIX_FALSE => Self::False,
            PREFIX_TRUE => Self::True,
            PREFIX_NIL => Self::Nil,
            PREFIX_U8 => Self::U8,
            PREFIX_U16 => Self::U16,
            PREFIX_U32 => Self::U32,
            PREFIX_U64 => Self::U64,
            PREFIX_I8 => Self::I8,
            PREFIX_I16 => Self::I16,
            PREFIX_I32 => Self::I32,
            PREFIX_I64 => Self::I64,
            PREFIX_F32 => Self::F32,
            PREFIX_F64 => Self::F64,
            PREFIX_STRING => Self::String,
            PREFIX_BINARY => Self::Binary,
            PREFIX_ARRAY => Self::Array,
            PREFIX_MAP => Self::Map,
            PREFIX_STRUCTURE => Self::Structure,
            PREFIX_VARIANT => Self::Variant,
            PREFIX_HANDLE => Self::Handle,
            NEGATIVE_FIXINT_MIN..=0xff => Self::NegativeFixInt(b as i8),
            other => Self::Reserved(other),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Self::PositiveFixInt(v) => v & POSITIVE_FIXINT_MAX,
            Self::NegativeFixInt(v) => (v as u8) | NEGATIVE_FIXINT_MIN,
            Self::False => PREFIX_FALSE,
            Self::True => PREFIX_TRUE,
            Self::Nil => PREFIX_NIL,
            Self::U8 => PREFIX_U8,
            Self::U16 => PREFIX_U16,
            Self::U32 => PREFIX_U32,
            Self::U64 => PREFIX_U64,
            Self::I8 => PREFIX_I8,
            Self::I16 => PREFIX_I16,
            Self::I32 => PREFIX_I32,
            Self::I64 => PREFIX_I64,
            Self::F32 => PREFIX_F32,
            Self::F64 => PREFIX_F64,
            Self::String => PREFIX_STRING,
            Self::Binary => PREFIX_BINARY,
            Self::Array => PREFIX_ARRAY,
            Self::Map => PREFIX_MAP,
            Self::Structure => PREFIX_STRUCTURE,
            Self::Variant => PREFIX_VARIANT,
            Self::Handle => PREFIX_HANDLE,
            Self::Reserved(b) => b,
        }
    }

    /// Number of payload bytes that directly follow an integer or float prefix.
    pub const fn fixed_payload_len(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
            _ => 0,
        }
    }
}

impl std::fmt::Display for EncodingByte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} (0x{:02x})", self, self.to_u8())
    }
}
