//! Integer capture for sequence packing.
//!
//! Sequences whose elements are all integers of one width are written as a
//! contiguous binary block. [IntegerCapture] serializes a single element and
//! reports its width and bits, or fails with [NotIntegral] for anything else.

use serde::ser::{self, Impossible, Serialize};

use super::consts::HANDLE_TOKEN;

/// A captured integer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Captured {
    /// Width in bytes
    pub width: usize,
    pub signed: bool,
    /// Value sign-extended to 64 bits
    pub bits: u64,
}

impl Captured {
    /// Little-endian bytes of the value at its own width.
    pub fn le_bytes(&self) -> ([u8; 8], usize) {
        (self.bits.to_le_bytes(), self.width)
    }
}

/// The value was not a plain integer.
#[derive(Debug)]
pub(crate) struct NotIntegral;

impl std::fmt::Display for NotIntegral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("value is not integral")
    }
}

impl std::error::Error for NotIntegral {}

impl ser::Error for NotIntegral {
    fn custom<T: std::fmt::Display>(_msg: T) -> Self {
        Self
    }
}

pub(crate) struct IntegerCapture;

macro_rules! capture_integer {
    ($fn_name: ident, $num_type: ty, $signed: literal) => {
        fn $fn_name(self, v: $num_type) -> Result<Self::Ok, Self::Error> {
            Ok(Captured {
                width: std::mem::size_of::<$num_type>(),
                signed: $signed,
                bits: v as i64 as u64,
            })
        }
    };
}

macro_rules! reject {
    ($($fn_name: ident ( $($arg: ty),* )),* $(,)?) => {
        $(
            fn $fn_name(self, $(_: $arg),*) -> Result<Self::Ok, Self::Error> {
                Err(NotIntegral)
            }
        )*
    };
}

impl ser::Serializer for IntegerCapture {
    type Ok = Captured;
    type Error = NotIntegral;

    type SerializeSeq = Impossible<Captured, NotIntegral>;
    type SerializeTuple = Impossible<Captured, NotIntegral>;
    type SerializeTupleStruct = Impossible<Captured, NotIntegral>;
    type SerializeTupleVariant = Impossible<Captured, NotIntegral>;
    type SerializeMap = Impossible<Captured, NotIntegral>;
    type SerializeStruct = Impossible<Captured, NotIntegral>;
    type SerializeStructVariant = Impossible<Captured, NotIntegral>;

    capture_integer! {serialize_i8, i8, true}
    capture_integer! {serialize_i16, i16, true}
    capture_integer! {serialize_i32, i32, true}
    capture_integer! {serialize_i64, i64, true}

    // unsigned values are zero-extended
    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        Ok(Captured {
            width: 1,
            signed: false,
            bits: v as u64,
        })
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        Ok(Captured {
            width: 2,
            signed: false,
            bits: v as u64,
        })
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        Ok(Captured {
            width: 4,
            signed: false,
            bits: v as u64,
        })
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        Ok(Captured {
            width: 8,
            signed: false,
            bits: v,
        })
    }

    reject! {
        serialize_bool(bool),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_none(),
        serialize_unit(),
        serialize_unit_struct(&'static str),
        serialize_unit_variant(&'static str, u32, &'static str),
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _: &T) -> Result<Self::Ok, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        match name == HANDLE_TOKEN {
            true => Err(NotIntegral),
            false => value.serialize(self),
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Self::Ok, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(NotIntegral)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(NotIntegral)
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}
