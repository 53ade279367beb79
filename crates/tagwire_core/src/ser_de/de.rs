//! Implementation of [serde::de::Deserializer] for [Deserializer]

use serde::de::{
    self, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};

use super::{
    consts::{
        EncodingByte, EMPTY_HANDLE_REFERENCE, EMPTY_VARIANT_INDEX, EMPTY_VARIANT_INDEX_U32,
        HANDLE_TOKEN,
    },
    err::{Error, SerDeResult},
};
use crate::{defaults, stream::Reader};

/// Reads encoded values out of a [Reader].
///
/// Structs/enums to be deserialized need to derive [serde::Deserialize].
/// All output is owned, nothing borrows from the input.
#[derive(Debug)]
pub struct Deserializer<R: Reader> {
    reader: R,
    // a tag read ahead while deciding between `None` and `Some`
    pending: Option<EncodingByte>,
    depth: usize,
    max_depth: usize,
}

/// Validate the next prefix byte against a pattern.
///
/// Pass in the name of the expected category for the error.
macro_rules! validate_tag {
    ($de: expr, $known: pat => $expected: expr) => {
        match $de.next_tag()? {
            $known => (),
            other => return Err(Error::prefix($expected, other)),
        }
    };
}

/// Impl deserialize unsigned primitives
macro_rules! deserialize_unsigned {
    ($fn_name: ident: $data_type: ty, $width: literal => $visitor_fn: ident) => {
        fn $fn_name<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: de::Visitor<'de>,
        {
            let value = self.read_unsigned($width, stringify!($data_type))?;
            visitor.$visitor_fn(value as $data_type)
        }
    };
}

/// Impl deserialize signed primitives
macro_rules! deserialize_signed {
    ($fn_name: ident: $data_type: ty, $width: literal => $visitor_fn: ident) => {
        fn $fn_name<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: de::Visitor<'de>,
        {
            let value = self.read_signed($width, stringify!($data_type))?;
            visitor.$visitor_fn(value as $data_type)
        }
    };
}

impl<R: Reader> Deserializer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_depth(reader, defaults::MAX_NESTING_DEPTH)
    }

    pub fn with_max_depth(reader: R, max_depth: usize) -> Self {
        Self {
            reader,
            pending: None,
            depth: 0,
            max_depth,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_tag(&mut self) -> SerDeResult<EncodingByte> {
        match self.pending.take() {
            Some(tag) => Ok(tag),
            None => self.reader.read_tag(),
        }
    }

    fn read_array<const N: usize>(&mut self) -> SerDeResult<[u8; N]> {
        let mut bytes = [0u8; N];
        self.reader.read_raw(&mut bytes)?;
        Ok(bytes)
    }

    /// Read an unsigned integer whose tag fits in `max_width` bytes.
    pub(crate) fn read_unsigned(
        &mut self,
        max_width: usize,
        expected: &'static str,
    ) -> SerDeResult<u64> {
        let tag = self.next_tag()?;
        match tag {
            EncodingByte::PositiveFixInt(v) => Ok(v as u64),
            _ if tag.fixed_payload_len() > max_width => Err(Error::prefix(expected, tag)),
            EncodingByte::U8 => Ok(u8::from_le_bytes(self.read_array()?) as u64),
            EncodingByte::U16 => Ok(u16::from_le_bytes(self.read_array()?) as u64),
            EncodingByte::U32 => Ok(u32::from_le_bytes(self.read_array()?) as u64),
            EncodingByte::U64 => Ok(u64::from_le_bytes(self.read_array()?)),
            other => Err(Error::prefix(expected, other)),
        }
    }

    /// Read a signed integer whose tag fits in `max_width` bytes.
    pub(crate) fn read_signed(
        &mut self,
        max_width: usize,
        expected: &'static str,
    ) -> SerDeResult<i64> {
        let tag = self.next_tag()?;
        match tag {
            EncodingByte::PositiveFixInt(v) => Ok(v as i64),
            EncodingByte::NegativeFixInt(v) => Ok(v as i64),
            _ if tag.fixed_payload_len() > max_width => Err(Error::prefix(expected, tag)),
            EncodingByte::I8 => Ok(i8::from_le_bytes(self.read_array()?) as i64),
            EncodingByte::I16 => Ok(i16::from_le_bytes(self.read_array()?) as i64),
            EncodingByte::I32 => Ok(i32::from_le_bytes(self.read_array()?) as i64),
            EncodingByte::I64 => Ok(i64::from_le_bytes(self.read_array()?)),
            other => Err(Error::prefix(expected, other)),
        }
    }

    fn read_len(&mut self) -> SerDeResult<usize> {
        let len = self.read_unsigned(8, "length")?;
        usize::try_from(len).map_err(|_| Error::InvalidContainerLength)
    }

    // large payloads are read in chunks so a bogus length cannot force a huge allocation
    fn read_bytes(&mut self, len: usize) -> SerDeResult<Vec<u8>> {
        const CHUNK: usize = 64 * 1024;

        if len > 0 {
            self.reader.ensure(len)?;
        }

        let mut bytes = Vec::with_capacity(len.min(CHUNK));
        let mut left = len;
        while left > 0 {
            let n = left.min(CHUNK);
            let start = bytes.len();
            bytes.resize(start + n, 0);
            self.reader.read_raw(&mut bytes[start..])?;
            left -= n;
        }

        Ok(bytes)
    }

    fn read_string(&mut self) -> SerDeResult<String> {
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidStringEncoding)
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> SerDeResult<T>) -> SerDeResult<T> {
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimitExceeded);
        }

        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        res
    }

    fn visit_counted_seq<'de, V>(&mut self, count: usize, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.nested(|de| {
            let mut accessor = CollectionsAccessor::from_deserializer(de, count);
            let value = visitor.visit_seq(&mut accessor)?;
            accessor.finish()?;
            Ok(value)
        })
    }

    fn visit_counted_map<'de, V>(&mut self, count: usize, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.nested(|de| {
            let mut accessor = CollectionsAccessor::from_deserializer(de, count);
            let value = visitor.visit_map(&mut accessor)?;
            accessor.finish()?;
            Ok(value)
        })
    }

    fn visit_binary_seq<'de, V>(&mut self, byte_len: usize, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.nested(|de| {
            let mut accessor = RawSeqAccess {
                de,
                width: None,
                remaining: byte_len,
            };
            let value = visitor.visit_seq(&mut accessor)?;
            match accessor.remaining {
                0 => Ok(value),
                _ => Err(Error::InvalidContainerLength),
            }
        })
    }

    /// Sequences are accepted in both their array and binary forms.
    fn visit_sequence<'de, V>(&mut self, len: Option<usize>, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.next_tag()? {
            EncodingByte::Array => {
                let count = self.read_len()?;
                if len.is_some_and(|len| len != count) {
                    return Err(Error::InvalidContainerLength);
                }
                self.visit_counted_seq(count, visitor)
            }
            EncodingByte::Binary => {
                let byte_len = self.read_len()?;
                self.visit_binary_seq(byte_len, visitor)
            }
            other => Err(Error::prefix("sequence", other)),
        }
    }

    fn visit_structure<'de, V>(&mut self, fields: usize, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_tag! {self, EncodingByte::Structure => "structure"}

        let count = self.read_len()?;
        if count != fields {
            return Err(Error::InvalidMemberCount {
                expected: fields,
                found: count,
            });
        }
        self.visit_counted_seq(count, visitor)
    }

    // called after the variant tag
    fn visit_variant<'de, V>(&mut self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        let index = match self.read_signed(8, "variant index")? {
            EMPTY_VARIANT_INDEX => EMPTY_VARIANT_INDEX_U32,
            i if (0..EMPTY_VARIANT_INDEX_U32 as i64).contains(&i) => i as u32,
            i => return Err(Error::InvalidVariantIndex(i)),
        };

        self.nested(|de| visitor.visit_enum(VariantAccessor { de, index }))
    }
}

impl<'de, 'a, R: Reader> de::Deserializer<'de> for &'a mut Deserializer<R> {
    type Error = Error;

    // the format is self-describing, so any value can be decoded (or skipped) without a schema
    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let tag = self.next_tag()?;

        match tag {
            EncodingByte::PositiveFixInt(v) => visitor.visit_u8(v),
            EncodingByte::NegativeFixInt(v) => visitor.visit_i8(v),
            EncodingByte::False => visitor.visit_bool(false),
            EncodingByte::True => visitor.visit_bool(true),
            EncodingByte::Nil => visitor.visit_unit(),
            EncodingByte::U8 => visitor.visit_u8(u8::from_le_bytes(self.read_array()?)),
            EncodingByte::U16 => visitor.visit_u16(u16::from_le_bytes(self.read_array()?)),
            EncodingByte::U32 => visitor.visit_u32(u32::from_le_bytes(self.read_array()?)),
            EncodingByte::U64 => visitor.visit_u64(u64::from_le_bytes(self.read_array()?)),
            EncodingByte::I8 => visitor.visit_i8(i8::from_le_bytes(self.read_array()?)),
            EncodingByte::I16 => visitor.visit_i16(i16::from_le_bytes(self.read_array()?)),
            EncodingByte::I32 => visitor.visit_i32(i32::from_le_bytes(self.read_array()?)),
            EncodingByte::I64 => visitor.visit_i64(i64::from_le_bytes(self.read_array()?)),
            EncodingByte::F32 => visitor.visit_f32(f32::from_le_bytes(self.read_array()?)),
            EncodingByte::F64 => visitor.visit_f64(f64::from_le_bytes(self.read_array()?)),
            EncodingByte::String => visitor.visit_string(self.read_string()?),
            EncodingByte::Binary => {
                let len = self.read_len()?;
                visitor.visit_byte_buf(self.read_bytes(len)?)
            }
            EncodingByte::Array | EncodingByte::Structure => {
                let count = self.read_len()?;
                self.visit_counted_seq(count, visitor)
            }
            EncodingByte::Map => {
                let count = self.read_len()?;
                self.visit_counted_map(count, visitor)
            }
            EncodingByte::Variant => self.visit_variant(visitor),
            // references are only resolved when a handle is asked for
            EncodingByte::Handle => visitor.visit_i64(self.read_signed(8, "handle reference")?),
            EncodingByte::Reserved(_) => Err(Error::prefix("any value", tag)),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.next_tag()? {
            EncodingByte::True => visitor.visit_bool(true),
            EncodingByte::False => visitor.visit_bool(false),
            other => Err(Error::prefix("bool", other)),
        }
    }

    deserialize_signed! {deserialize_i64: i64, 8 => visit_i64}
    deserialize_signed! {deserialize_i32: i32, 4 => visit_i32}
    deserialize_signed! {deserialize_i16: i16, 2 => visit_i16}
    deserialize_signed! {deserialize_i8: i8, 1 => visit_i8}

    deserialize_unsigned! {deserialize_u64: u64, 8 => visit_u64}
    deserialize_unsigned! {deserialize_u32: u32, 4 => visit_u32}
    deserialize_unsigned! {deserialize_u16: u16, 2 => visit_u16}
    deserialize_unsigned! {deserialize_u8: u8, 1 => visit_u8}

    fn deserialize_i128<V>(self, _: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        Err(Error::UnsupportedType("i128"))
    }

    fn deserialize_u128<V>(self, _: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        Err(Error::UnsupportedType("u128"))
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        validate_tag! {self, EncodingByte::F32 => "f32"}
        visitor.visit_f32(f32::from_le_bytes(self.read_array()?))
    }

    // a narrower float widens losslessly
    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.next_tag()? {
            EncodingByte::F64 => visitor.visit_f64(f64::from_le_bytes(self.read_array()?)),
            EncodingByte::F32 => visitor.visit_f64(f32::from_le_bytes(self.read_array()?) as f64),
            other => Err(Error::prefix("f64", other)),
        }
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let code = self.read_unsigned(4, "char")? as u32;
        visitor.visit_char(char::from_u32(code).ok_or(Error::InvalidCharacter(code))?)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        validate_tag! {self, EncodingByte::String => "string"}
        visitor.visit_string(self.read_string()?)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.next_tag()? {
            EncodingByte::Binary => {
                let len = self.read_len()?;
                visitor.visit_byte_buf(self.read_bytes(len)?)
            }
            EncodingByte::Array => {
                let count = self.read_len()?;
                self.visit_counted_seq(count, visitor)
            }
            other => Err(Error::prefix("bytes", other)),
        }
    }

    // `Some` has no marker, so the value's own tag is kept for the inner read
    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.next_tag()? {
            EncodingByte::Nil => visitor.visit_none(),
            tag => {
                self.pending = Some(tag);
                self.nested(|de| visitor.visit_some(de))
            }
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        validate_tag! {self, EncodingByte::Nil => "unit"}
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if name != HANDLE_TOKEN {
            return visitor.visit_newtype_struct(self);
        }

        validate_tag! {self, EncodingByte::Handle => "handle"}
        let raw = match self.read_signed(8, "handle reference")? {
            EMPTY_HANDLE_REFERENCE => -1,
            reference => self.reader.get_handle(reference)?,
        };
        visitor.visit_newtype_struct(IntoDeserializer::<'de, Error>::into_deserializer(raw))
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.visit_sequence(None, visitor)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.visit_sequence(Some(len), visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        validate_tag! {self, EncodingByte::Map => "map"}
        let count = self.read_len()?;
        self.visit_counted_map(count, visitor)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.visit_structure(fields.len(), visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        validate_tag! {self, EncodingByte::Variant => "variant"}
        self.visit_variant(visitor)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_any(visitor)
    }

    // strings and blobs are skipped without being buffered
    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.next_tag()? {
            EncodingByte::String | EncodingByte::Binary => {
                let len = self.read_len()?;
                self.reader.skip(len)?;
                visitor.visit_unit()
            }
            tag => {
                self.pending = Some(tag);
                self.deserialize_any(visitor)
            }
        }
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// This wrapper contains implementations for accessing counted collections,
/// such as arrays, maps and structures.
struct CollectionsAccessor<'a, R: Reader> {
    des: &'a mut Deserializer<R>,
    remaining: usize,
}

impl<'a, R: Reader> CollectionsAccessor<'a, R> {
    fn from_deserializer(des: &'a mut Deserializer<R>, count: usize) -> Self {
        Self {
            des,
            remaining: count,
        }
    }

    /// A visitor that stops early would leave the stream misaligned.
    fn finish(&self) -> SerDeResult<()> {
        match self.remaining {
            0 => Ok(()),
            _ => Err(Error::InvalidContainerLength),
        }
    }
}

impl<'de, 'a, R: Reader> SeqAccess<'de> for CollectionsAccessor<'a, R> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.des).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

impl<'de, 'a, R: Reader> MapAccess<'de> for CollectionsAccessor<'a, R> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.des).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.des)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// Accessor for the active alternative of a variant.
struct VariantAccessor<'a, R: Reader> {
    de: &'a mut Deserializer<R>,
    index: u32,
}

impl<'a, R: Reader> VariantAccessor<'a, R> {
    fn is_empty(&self) -> bool {
        self.index == EMPTY_VARIANT_INDEX_U32
    }
}

impl<'de, 'a, R: Reader> EnumAccess<'de> for VariantAccessor<'a, R> {
    type Error = Error;

    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let value = seed.deserialize(IntoDeserializer::<'de, Error>::into_deserializer(
            self.index,
        ))?;
        Ok((value, self))
    }
}

impl<'de, 'a, R: Reader> VariantAccess<'de> for VariantAccessor<'a, R> {
    type Error = Error;

    // empty variants carry no payload at all
    fn unit_variant(self) -> Result<(), Self::Error> {
        if self.is_empty() {
            return Ok(());
        }
        validate_tag! {self.de, EncodingByte::Nil => "unit variant"}
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.is_empty() {
            true => seed.deserialize(IntoDeserializer::<'de, Error>::into_deserializer(())),
            false => seed.deserialize(self.de),
        }
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.is_empty() {
            return Err(Error::InvalidVariantIndex(EMPTY_VARIANT_INDEX));
        }
        self.de.visit_structure(len, visitor)
    }

    fn struct_variant<V>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.is_empty() {
            return Err(Error::InvalidVariantIndex(EMPTY_VARIANT_INDEX));
        }
        self.de.visit_structure(fields.len(), visitor)
    }
}

/// Accessor for the elements of a binary block.
///
/// The element width is only known once the first element asks for an integer
/// of a given size, at which point the byte length must divide evenly.
struct RawSeqAccess<'a, R: Reader> {
    de: &'a mut Deserializer<R>,
    width: Option<usize>,
    remaining: usize,
}

impl<'de, 'a, R: Reader> SeqAccess<'de> for RawSeqAccess<'a, R> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        seed.deserialize(RawElement {
            de: &mut *self.de,
            width: &mut self.width,
            remaining: &mut self.remaining,
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        self.width.map(|w| self.remaining / w)
    }
}

struct RawElement<'b, R: Reader> {
    de: &'b mut Deserializer<R>,
    width: &'b mut Option<usize>,
    remaining: &'b mut usize,
}

impl<'b, R: Reader> RawElement<'b, R> {
    fn take<const N: usize>(self) -> SerDeResult<[u8; N]> {
        match (*self.width, *self.remaining % N) {
            (None, 0) => *self.width = Some(N),
            (None, _) => return Err(Error::InvalidContainerLength),
            (Some(width), _) if width != N => return Err(Error::HeterogeneousElements),
            (Some(_), _) => (),
        }

        *self.remaining -= N;
        self.de.read_array::<N>()
    }
}

/// Impl deserialize for packed integers
macro_rules! deserialize_raw_integer {
    ($fn_name: ident: $data_type: ty, $width: literal => $visitor_fn: ident) => {
        fn $fn_name<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: de::Visitor<'de>,
        {
            let bytes = self.take::<$width>()?;
            visitor.$visitor_fn(<$data_type>::from_le_bytes(bytes))
        }
    };
}

impl<'de, 'b, R: Reader> de::Deserializer<'de> for RawElement<'b, R> {
    type Error = Error;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        Err(Error::UnsupportedType("untyped element of a binary block"))
    }

    deserialize_raw_integer! {deserialize_u8: u8, 1 => visit_u8}
    deserialize_raw_integer! {deserialize_u16: u16, 2 => visit_u16}
    deserialize_raw_integer! {deserialize_u32: u32, 4 => visit_u32}
    deserialize_raw_integer! {deserialize_u64: u64, 8 => visit_u64}
    deserialize_raw_integer! {deserialize_i8: i8, 1 => visit_i8}
    deserialize_raw_integer! {deserialize_i16: i16, 2 => visit_i16}
    deserialize_raw_integer! {deserialize_i32: i32, 4 => visit_i32}
    deserialize_raw_integer! {deserialize_i64: i64, 8 => visit_i64}

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    // elements of a known width can still be skipped
    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let Some(width) = *self.width else {
            return Err(Error::UnsupportedType("untyped element of a binary block"));
        };
        *self.remaining -= width;
        self.de.reader.skip(width)?;
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i128 u128 f32 f64 char str string bytes byte_buf option unit unit_struct
        seq tuple tuple_struct map struct enum identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferReader;
    use serde::Deserialize;

    fn decode<T: de::DeserializeOwned>(bytes: &[u8]) -> SerDeResult<T> {
        let mut de = Deserializer::new(BufferReader::new(bytes));
        T::deserialize(&mut de)
    }

    #[test]
    fn test_integer_width_rules() {
        assert_eq!(decode::<u8>(&[0x05]).unwrap(), 5);
        assert_eq!(decode::<u16>(&[0x83, 200]).unwrap(), 200);
        assert_eq!(decode::<i64>(&[0xff]).unwrap(), -1);
        assert_eq!(decode::<i16>(&[0x87, 0xdf]).unwrap(), -33);

        // wider than the target
        assert!(matches!(
            decode::<u8>(&[0x84, 0x34, 0x12]),
            Err(Error::PrefixNotMatched { .. })
        ));
        // unsigned tags never satisfy signed targets
        assert!(decode::<i32>(&[0x83, 200]).is_err());
        assert!(decode::<u32>(&[0xff]).is_err());
    }

    #[test]
    fn test_binary_length_must_divide_width() {
        let err = decode::<Vec<u16>>(&[0x8e, 0x03, 1, 0, 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidContainerLength));
        assert!(err.is_bounds());

        assert_eq!(
            decode::<Vec<u16>>(&[0x8e, 0x04, 1, 0, 2, 0]).unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_struct_member_count() {
        #[derive(Debug, Deserialize)]
        struct Pair {
            _a: u8,
            _b: u8,
        }

        let err = decode::<Pair>(&[0x91, 0x03, 1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMemberCount {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn test_fixed_array_rejects_longer_input() {
        let err = decode::<[u8; 2]>(&[0x8e, 0x03, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidContainerLength));
        let err = decode::<(u8, u8)>(&[0x8f, 0x03, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidContainerLength));
    }

    #[test]
    fn test_reserved_and_truncated_input() {
        assert!(matches!(
            decode::<serde::de::IgnoredAny>(&[0x94]),
            Err(Error::PrefixNotMatched { .. })
        ));
        assert!(matches!(
            decode::<String>(&[0x8d, 0x05, b'a']),
            Err(Error::BufferExhausted { .. })
        ));
        assert!(matches!(
            decode::<String>(&[0x8d, 0x02, 0xc3, 0x28]),
            Err(Error::InvalidStringEncoding)
        ));
        assert!(matches!(
            decode::<char>(&[0x85, 0x00, 0xd8, 0x00, 0x00]),
            Err(Error::InvalidCharacter(0xd800))
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let mut bytes: Vec<u8> = std::iter::repeat([0x8f, 0x01])
            .take(200)
            .flatten()
            .collect();
        bytes.push(0x00);
        let mut de = Deserializer::new(BufferReader::new(&bytes));
        let err = serde::de::IgnoredAny::deserialize(&mut de).unwrap_err();
        assert!(matches!(err, Error::DepthLimitExceeded));
    }
}
