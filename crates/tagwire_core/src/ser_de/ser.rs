//! Implementation of [serde::ser::Serializer] for [Serializer]

use serde::{ser, Serialize};

use super::{
    consts::{
        EncodingByte, EMPTY_HANDLE_REFERENCE, EMPTY_VARIANT_INDEX, EMPTY_VARIANT_INDEX_U32,
        HANDLE_TOKEN,
    },
    err::{Error, SerDeResult},
    packing::IntegerCapture,
};
use crate::stream::Writer;

/// Writes the encoded form of any [serde::Serialize] value into a [Writer].
///
/// Structs/enums to be serialized need to derive [serde::Serialize].
#[derive(Debug)]
pub struct Serializer<W: Writer> {
    writer: W,
}

impl<W: Writer> Serializer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> SerDeResult<()> {
        self.writer.flush()
    }
}

/// Write an unsigned integer with the narrowest tag that holds it.
///
/// All counts, lengths and selectors go through here.
pub(crate) fn write_unsigned<W: Writer + ?Sized>(w: &mut W, v: u64) -> SerDeResult<()> {
    if v <= 0x7f {
        w.write_tag(EncodingByte::PositiveFixInt(v as u8))
    } else if v <= u8::MAX as u64 {
        w.write_tag(EncodingByte::U8)?;
        w.write_raw(&(v as u8).to_le_bytes())
    } else if v <= u16::MAX as u64 {
        w.write_tag(EncodingByte::U16)?;
        w.write_raw(&(v as u16).to_le_bytes())
    } else if v <= u32::MAX as u64 {
        w.write_tag(EncodingByte::U32)?;
        w.write_raw(&(v as u32).to_le_bytes())
    } else {
        w.write_tag(EncodingByte::U64)?;
        w.write_raw(&v.to_le_bytes())
    }
}

/// Write a signed integer with the narrowest tag that holds it.
pub(crate) fn write_signed<W: Writer + ?Sized>(w: &mut W, v: i64) -> SerDeResult<()> {
    if (0..=0x7f).contains(&v) {
        w.write_tag(EncodingByte::PositiveFixInt(v as u8))
    } else if (-32..0).contains(&v) {
        w.write_tag(EncodingByte::NegativeFixInt(v as i8))
    } else if i8::try_from(v).is_ok() {
        w.write_tag(EncodingByte::I8)?;
        w.write_raw(&(v as i8).to_le_bytes())
    } else if i16::try_from(v).is_ok() {
        w.write_tag(EncodingByte::I16)?;
        w.write_raw(&(v as i16).to_le_bytes())
    } else if i32::try_from(v).is_ok() {
        w.write_tag(EncodingByte::I32)?;
        w.write_raw(&(v as i32).to_le_bytes())
    } else {
        w.write_tag(EncodingByte::I64)?;
        w.write_raw(&v.to_le_bytes())
    }
}

fn write_len<W: Writer + ?Sized>(w: &mut W, len: usize) -> SerDeResult<()> {
    write_unsigned(w, len as u64)
}

fn wire_variant_index(index: u32) -> i64 {
    match index {
        EMPTY_VARIANT_INDEX_U32 => EMPTY_VARIANT_INDEX,
        i => i as i64,
    }
}

/// Keeps the first byte written and refuses everything else.
#[derive(Default)]
struct LeadingByte(Option<u8>);

impl Writer for LeadingByte {
    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()> {
        self.0 = bytes.first().copied();
        Err(Error::Custom("leading byte taken".into()))
    }
}

// a nil tag has no payload, so a value leading with one is exactly nil
fn encodes_as_nil<T: ?Sized + Serialize>(value: &T) -> bool {
    let mut first = LeadingByte::default();
    let _ = value.serialize(&mut Serializer::new(&mut first));
    first.0 == Some(EncodingByte::Nil.to_u8())
}

/// Impl serialize for primitives
macro_rules! serialize_numeric_primitive {
    ($fn_name: ident, $num_type: ty => $write_fn: ident as $conv_type: ty) => {
        fn $fn_name(self, v: $num_type) -> Result<Self::Ok, Self::Error> {
            $write_fn(&mut self.writer, v as $conv_type)
        }
    };
}

impl<'a, W: Writer> ser::Serializer for &'a mut Serializer<W> {
    type Ok = ();

    type Error = Error;

    type SerializeSeq = Compound<'a, W>;

    type SerializeTuple = Compound<'a, W>;

    type SerializeTupleStruct = Compound<'a, W>;

    type SerializeTupleVariant = Compound<'a, W>;

    type SerializeMap = Compound<'a, W>;

    type SerializeStruct = Compound<'a, W>;

    type SerializeStructVariant = Compound<'a, W>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        match v {
            true => self.writer.write_tag(EncodingByte::True),
            false => self.writer.write_tag(EncodingByte::False),
        }
    }

    serialize_numeric_primitive! {serialize_i8, i8 => write_signed as i64}
    serialize_numeric_primitive! {serialize_i16, i16 => write_signed as i64}
    serialize_numeric_primitive! {serialize_i32, i32 => write_signed as i64}
    serialize_numeric_primitive! {serialize_i64, i64 => write_signed as i64}

    serialize_numeric_primitive! {serialize_u8, u8 => write_unsigned as u64}
    serialize_numeric_primitive! {serialize_u16, u16 => write_unsigned as u64}
    serialize_numeric_primitive! {serialize_u32, u32 => write_unsigned as u64}
    serialize_numeric_primitive! {serialize_u64, u64 => write_unsigned as u64}

    fn serialize_i128(self, _: i128) -> Result<Self::Ok, Self::Error> {
        Err(Error::UnsupportedType("i128"))
    }

    fn serialize_u128(self, _: u128) -> Result<Self::Ok, Self::Error> {
        Err(Error::UnsupportedType("u128"))
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.writer.write_tag(EncodingByte::F32)?;
        self.writer.write_raw(&v.to_le_bytes())
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.writer.write_tag(EncodingByte::F64)?;
        self.writer.write_raw(&v.to_le_bytes())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        write_unsigned(&mut self.writer, v as u32 as u64)
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.writer.write_tag(EncodingByte::String)?;
        write_len(&mut self.writer, v.len())?;
        self.writer.write_raw(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.writer.write_tag(EncodingByte::Binary)?;
        write_len(&mut self.writer, v.len())?;
        self.writer.write_raw(v)
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.writer.write_tag(EncodingByte::Nil)
    }

    // `Some` carries no marker of its own
    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: serde::Serialize,
    {
        if encodes_as_nil(value) {
            return Err(Error::AmbiguousOption);
        }
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.writer.write_tag(EncodingByte::Nil)
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    // the index, then a nil payload unless the variant is empty
    fn serialize_unit_variant(
        self,
        _: &'static str,
        variant_index: u32,
        _: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        let index = wire_variant_index(variant_index);
        self.writer.write_tag(EncodingByte::Variant)?;
        write_signed(&mut self.writer, index)?;

        match index == EMPTY_VARIANT_INDEX {
            true => Ok(()),
            false => self.writer.write_tag(EncodingByte::Nil),
        }
    }

    // serialize the inner value, handles are routed to the writer's handle table
    fn serialize_newtype_struct<T: ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: serde::Serialize,
    {
        if name != HANDLE_TOKEN {
            return value.serialize(self);
        }

        let raw = value
            .serialize(IntegerCapture)
            .map_err(|_| Error::UnsupportedType("handle"))?;
        let reference = match raw.bits as i64 {
            -1 => EMPTY_HANDLE_REFERENCE,
            fd => self.writer.push_handle(fd as i32)?,
        };

        self.writer.write_tag(EncodingByte::Handle)?;
        write_signed(&mut self.writer, reference)
    }

    // serialize the index, then the inner variant
    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        variant_index: u32,
        _: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: serde::Serialize,
    {
        self.writer.write_tag(EncodingByte::Variant)?;
        write_signed(&mut self.writer, wire_variant_index(variant_index))?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        match len {
            Some(0) => {
                self.writer.write_tag(EncodingByte::Array)?;
                write_len(&mut self.writer, 0)?;
                Ok(Compound::new(self, SeqState::Direct))
            }
            Some(len) => Ok(Compound::new(self, SeqState::Undecided { len })),
            None => Ok(Compound::new(self, SeqState::Buffered(Buffered::sequence()))),
        }
    }

    // tuples (and fixed arrays) may mix integer widths, so the form is decided at the end
    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(Compound::new(self, SeqState::Buffered(Buffered::sequence())))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_tuple(len)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        self.writer.write_tag(EncodingByte::Variant)?;
        write_signed(&mut self.writer, wire_variant_index(variant_index))?;
        self.writer.write_tag(EncodingByte::Structure)?;
        write_len(&mut self.writer, len)?;
        Ok(Compound::new(self, SeqState::Direct))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        match len {
            Some(len) => {
                self.writer.write_tag(EncodingByte::Map)?;
                write_len(&mut self.writer, len)?;
                Ok(Compound::new(self, SeqState::Direct))
            }
            None => Ok(Compound::new(self, SeqState::Buffered(Buffered::map()))),
        }
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.writer.write_tag(EncodingByte::Structure)?;
        write_len(&mut self.writer, len)?;
        Ok(Compound::new(self, SeqState::Direct))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        self.serialize_tuple_variant(name, variant_index, variant, len)
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// How the elements of a compound value reach the writer.
enum SeqState {
    /// Header already written, elements go straight through
    Direct,
    /// Known length, the header waits for the first element
    Undecided { len: usize },
    /// Length or form unknown until all elements are seen
    Buffered(Buffered),
}

struct Buffered {
    is_map: bool,
    count: usize,
    scratch: Vec<u8>,
    /// Raw element bytes, kept while every element is an integer of one width
    packed: Option<(Option<usize>, Vec<u8>)>,
}

impl Buffered {
    fn sequence() -> Self {
        Self {
            is_map: false,
            count: 0,
            scratch: Vec::new(),
            packed: Some((None, Vec::new())),
        }
    }

    fn map() -> Self {
        Self {
            is_map: true,
            count: 0,
            scratch: Vec::new(),
            packed: None,
        }
    }

    fn track<T: ?Sized + Serialize>(&mut self, value: &T) {
        let Some((width, bytes)) = self.packed.as_mut() else {
            return;
        };

        let captured = match value.serialize(IntegerCapture) {
            Ok(captured) if width.map_or(true, |w| w == captured.width) => captured,
            _ => {
                self.packed = None;
                return;
            }
        };
        *width = Some(captured.width);
        let (raw, len) = captured.le_bytes();
        bytes.extend_from_slice(&raw[..len]);
    }
}

/// Collects buffered elements while forwarding handles to the real writer,
/// so handle references stay in encoding order.
struct Scratch<'a> {
    bytes: &'a mut Vec<u8>,
    parent: &'a mut dyn Writer,
}

impl<'a> Writer for Scratch<'a> {
    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()> {
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn push_handle(&mut self, raw: i32) -> SerDeResult<i64> {
        self.parent.push_handle(raw)
    }
}

/// Serializer state for sequences, tuples, maps and structures.
pub struct Compound<'a, W: Writer> {
    ser: &'a mut Serializer<W>,
    state: SeqState,
}

impl<'a, W: Writer> Compound<'a, W> {
    fn new(ser: &'a mut Serializer<W>, state: SeqState) -> Self {
        Self { ser, state }
    }

    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> SerDeResult<()> {
        match &mut self.state {
            SeqState::Direct => value.serialize(&mut *self.ser),
            // integer elements are buffered until the whole sequence proves packable
            SeqState::Undecided { len } => match value.serialize(IntegerCapture) {
                Ok(_) => {
                    let mut buffered = Buffered::sequence();
                    buffered.count = 1;
                    self.state = SeqState::Buffered(buffered);
                    self.element(value)
                }
                Err(_) => {
                    let len = *len;
                    self.ser.writer.write_tag(EncodingByte::Array)?;
                    write_len(&mut self.ser.writer, len)?;
                    self.state = SeqState::Direct;
                    value.serialize(&mut *self.ser)
                }
            },
            SeqState::Buffered(buffered) => {
                if !buffered.is_map {
                    buffered.track(value);
                }
                let mut sub = Serializer::new(Scratch {
                    bytes: &mut buffered.scratch,
                    parent: &mut self.ser.writer,
                });
                value.serialize(&mut sub)
            }
        }
    }

    fn finish(self) -> SerDeResult<()> {
        let Compound { ser, state } = self;
        let SeqState::Buffered(buffered) = state else {
            return Ok(());
        };

        match buffered.packed {
            _ if buffered.is_map => {
                ser.writer.write_tag(EncodingByte::Map)?;
                write_len(&mut ser.writer, buffered.count)?;
                ser.writer.write_raw(&buffered.scratch)
            }
            Some((Some(_), bytes)) => {
                ser.writer.write_tag(EncodingByte::Binary)?;
                write_len(&mut ser.writer, bytes.len())?;
                ser.writer.write_raw(&bytes)
            }
            _ => {
                ser.writer.write_tag(EncodingByte::Array)?;
                write_len(&mut ser.writer, buffered.count)?;
                ser.writer.write_raw(&buffered.scratch)
            }
        }
    }

    fn count_entry(&mut self) {
        if let SeqState::Buffered(buffered) = &mut self.state {
            buffered.count += 1;
        }
    }
}

impl<'a, W: Writer> ser::SerializeSeq for Compound<'a, W> {
    type Ok = ();

    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.count_entry();
        self.element(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'a, W: Writer> ser::SerializeTuple for Compound<'a, W> {
    type Ok = ();

    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.count_entry();
        self.element(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'a, W: Writer> ser::SerializeTupleStruct for Compound<'a, W> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.count_entry();
        self.element(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'a, W: Writer> ser::SerializeTupleVariant for Compound<'a, W> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'a, W: Writer> ser::SerializeMap for Compound<'a, W> {
    type Ok = ();

    type Error = Error;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.count_entry();
        self.element(key)
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

// struct fields are written in declaration order, without names
impl<'a, W: Writer> ser::SerializeStruct for Compound<'a, W> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl<'a, W: Writer> ser::SerializeStructVariant for Compound<'a, W> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferWriter;

    fn encode<T: Serialize>(value: &T) -> Vec<u8> {
        let mut ser = Serializer::new(BufferWriter::new());
        value.serialize(&mut ser).unwrap();
        ser.into_inner().into_inner()
    }

    #[test]
    fn test_narrowest_integer_tags() {
        assert_eq!(encode(&5u64), vec![0x05]);
        assert_eq!(encode(&200u64), vec![0x83, 200]);
        assert_eq!(encode(&0x1234u32), vec![0x84, 0x34, 0x12]);
        assert_eq!(encode(&-1i32), vec![0xff]);
        assert_eq!(encode(&-33i32), vec![0x87, (-33i8) as u8]);
        // signed targets never get unsigned tags
        assert_eq!(encode(&200i32), vec![0x88, 200, 0]);
        assert_eq!(encode(&u64::MAX).len(), 9);
    }

    #[test]
    fn test_sequence_forms() {
        assert_eq!(encode(&vec![1u16, 2]), vec![0x8e, 0x04, 1, 0, 2, 0]);
        assert_eq!(encode(&Vec::<u16>::new()), vec![0x8f, 0x00]);
        assert_eq!(encode(&[7u8; 3]), vec![0x8e, 0x03, 7, 7, 7]);
        assert_eq!(
            encode(&vec![true, false]),
            vec![0x8f, 0x02, 0x81, 0x80]
        );
        // mixed widths fall back to an array
        assert_eq!(encode(&(1u8, 2u16)), vec![0x8f, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_structure_and_variant_headers() {
        #[derive(Serialize)]
        struct Point {
            x: i8,
            y: i8,
        }

        #[derive(Serialize)]
        enum Shape {
            Dot,
            Line(u8, u8),
        }

        assert_eq!(encode(&Point { x: 1, y: -1 }), vec![0x91, 0x02, 0x01, 0xff]);
        assert_eq!(encode(&Shape::Dot), vec![0x92, 0x00, 0x82]);
        assert_eq!(
            encode(&Shape::Line(3, 4)),
            vec![0x92, 0x01, 0x91, 0x02, 0x03, 0x04]
        );
        assert_eq!(encode(&Option::<u8>::None), vec![0x82]);
        assert_eq!(encode(&Some(3u8)), vec![0x03]);
    }

    #[test]
    fn test_mixed_sequence_falls_back_to_array() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        #[serde(untagged)]
        enum Cell {
            Int(i64),
            Text(String),
        }

        #[derive(Serialize)]
        #[serde(untagged)]
        enum Num {
            Small(u8),
            Wide(u32),
        }

        let cells = vec![Cell::Int(1), Cell::Text("a".into())];
        let bytes = encode(&cells);
        assert_eq!(bytes, vec![0x8f, 0x02, 0x01, 0x8d, 0x01, b'a']);
        assert_eq!(crate::ser_de::deserialize::<Vec<Cell>>(&bytes).unwrap(), cells);
        assert_eq!(crate::ser_de::encoded_size(&cells).unwrap(), bytes.len());

        // integers of one width, then a wider one
        assert_eq!(
            encode(&vec![Num::Small(1), Num::Small(2), Num::Wide(3)]),
            vec![0x8f, 0x03, 0x01, 0x02, 0x03]
        );
        assert_eq!(encode(&vec![Num::Small(1), Num::Small(2)]), vec![0x8e, 0x02, 1, 2]);
    }

    #[test]
    fn test_some_around_nil_is_rejected() {
        let mut ser = Serializer::new(BufferWriter::new());
        assert!(matches!(
            Some(()).serialize(&mut ser),
            Err(Error::AmbiguousOption)
        ));
        assert!(matches!(
            Some(None::<u8>).serialize(&mut ser),
            Err(Error::AmbiguousOption)
        ));
        assert!(ser.writer().as_bytes().is_empty());

        assert_eq!(encode(&Some(Some(5u8))), vec![0x05]);
        assert_eq!(encode(&Some(Vec::<u8>::new())), vec![0x8f, 0x00]);
        assert_eq!(
            crate::ser_de::deserialize::<Option<u8>>(&encode(&Some(5u8))).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn test_unsupported_values() {
        let mut ser = Serializer::new(BufferWriter::new());
        assert!(matches!(
            1u128.serialize(&mut ser),
            Err(Error::UnsupportedType("u128"))
        ));
    }
}
