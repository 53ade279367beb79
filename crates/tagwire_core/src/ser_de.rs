//! Serialization and deserialization module
//!
//! A compact, self-describing binary format implemented as a serde data format.
//! Every value starts with an [EncodingByte] prefix; see [consts] for the table.

pub mod consts;
mod de;
mod err;
mod packing;
mod ser;

pub use consts::EncodingByte;
pub use de::Deserializer;
pub use err::{Error, SerDeResult};
pub use ser::{Compound, Serializer};

use crate::stream::{BufferReader, BufferWriter, Reader, SizeWriter, Writer};

/// Serialize a data structure to a vector of bytes
pub fn serialize<T: serde::Serialize + ?Sized>(value: &T) -> SerDeResult<Vec<u8>> {
    let mut serializer = Serializer::new(BufferWriter::new());

    value.serialize(&mut serializer)?;

    Ok(serializer.into_inner().into_inner())
}

/// Serialize a data structure into an existing writer
pub fn serialize_into<T, W>(value: &T, writer: W) -> SerDeResult<()>
where
    T: serde::Serialize + ?Sized,
    W: Writer,
{
    let mut serializer = Serializer::new(writer);
    value.serialize(&mut serializer)
}

/// Deserialize a data structure from a slice of bytes
pub fn deserialize<T>(bytes: &[u8]) -> SerDeResult<T>
where
    T: serde::de::DeserializeOwned,
{
    deserialize_from(BufferReader::new(bytes))
}

/// Deserialize a data structure from a reader
pub fn deserialize_from<T, R>(reader: R) -> SerDeResult<T>
where
    T: serde::de::DeserializeOwned,
    R: Reader,
{
    let mut deserializer = Deserializer::new(reader);

    T::deserialize(&mut deserializer)
}

/// Exact number of bytes [serialize] would produce.
///
/// Only fails for values that cannot be encoded at all.
pub fn encoded_size<T: serde::Serialize + ?Sized>(value: &T) -> SerDeResult<usize> {
    let mut serializer = Serializer::new(SizeWriter::new());

    value.serialize(&mut serializer)?;

    Ok(serializer.into_inner().size())
}

/// Serializing and deserializing tests
#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, HashMap},
        fmt::Debug,
    };

    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
    struct S {
        item: bool,
        number: i32,
        s: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        id: u32,
        name: String,
        tags: Vec<String>,
        scores: Vec<i16>,
        ratio: f64,
        parent: Option<Box<Record>>,
        #[serde(with = "serde_bytes")]
        blob: Vec<u8>,
        initial: char,
    }

    /// Performs a ser-de process, checking equality and the size contract
    fn ser_de_loop<T: Debug + PartialEq + Serialize + for<'a> Deserialize<'a>>(input: T) {
        let ser = serialize(&input).unwrap();

        println!("bytes: {} - {:?}", ser.len(), ser);
        assert_eq!(encoded_size(&input).unwrap(), ser.len());

        let des: T = deserialize(&ser).unwrap();
        assert_eq!(des, input);
    }

    #[test]
    fn test_ser_de_primitives() {
        ser_de_loop(true);
        ser_de_loop(0u8);
        ser_de_loop(u64::MAX);
        ser_de_loop(i64::MIN);
        ser_de_loop(-32i8);
        ser_de_loop(-33i16);
        ser_de_loop(1.5f32);
        ser_de_loop(-0.25f64);
        ser_de_loop('👏');
        ser_de_loop(());
        ser_de_loop("how about that".to_string());
        ser_de_loop(String::new());
    }

    #[test]
    fn test_ser_de_map() {
        let map: HashMap<String, i32> = HashMap::from([
            ("asd".to_string(), 10_000),
            ("how about that 👏👏👏".to_string(), 69),
        ]);
        ser_de_loop(map);

        let nested: BTreeMap<u8, Vec<Option<u8>>> =
            BTreeMap::from([(1, vec![Some(1), None]), (2, vec![])]);
        ser_de_loop(nested);
    }

    /// Testing ser_de of sequences, like vectors and tuples
    #[test]
    fn test_ser_de_seq() {
        let seq = vec![100, 200, 300, 400];
        ser_de_loop(seq);

        let tup = (12, 100, 20000);
        ser_de_loop(tup);

        ser_de_loop((1u8, -2i64, "three".to_string()));
        ser_de_loop([0xffu8; 32]);
        ser_de_loop(vec![vec![1u64, u64::MAX], vec![]]);
        ser_de_loop(vec!["a".to_string(), "b".to_string()]);
        ser_de_loop(Vec::<i8>::new());
    }

    /// Testing ser_de of structs
    #[test]
    fn test_ser_de_struct() {
        let s = S {
            item: false,
            number: 10000,
            s: "asd".to_string(),
        };
        ser_de_loop(s);

        let child = Record {
            id: 2,
            name: "child".into(),
            tags: vec![],
            scores: vec![-1, 300],
            ratio: 0.5,
            parent: None,
            blob: vec![],
            initial: 'c',
        };
        ser_de_loop(Record {
            id: 1,
            name: "root".into(),
            tags: vec!["x".into()],
            scores: vec![],
            ratio: 1e10,
            parent: Some(Box::new(child)),
            blob: vec![0, 1, 2, 255],
            initial: 'r',
        });
    }

    #[test]
    fn test_ser_de_enum() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        enum E {
            This,
            That(bool),
            WhatEver((i32, bool)),
            IDontCare { a: bool, b: i8, c: String },
        }

        ser_de_loop(E::This);
        ser_de_loop(E::That(false));
        ser_de_loop(E::WhatEver((10, true)));
        ser_de_loop(E::IDontCare {
            a: true,
            b: i8::MAX,
            c: "Hello How are You".to_string(),
        });
        ser_de_loop(vec![E::This, E::That(true)]);
    }

    #[test]
    fn test_ser_de_std_result() {
        ser_de_loop(Result::<u32, String>::Ok(7));
        ser_de_loop(Result::<u32, String>::Err("nope".into()));
    }

    #[test]
    fn test_unknown_values_can_be_skipped() {
        let value = (
            vec![S::default()],
            HashMap::from([(1u8, "x".to_string())]),
            Some(vec![1u32, 2]),
            Result::<(), i8>::Err(-1),
        );
        let mut bytes = serialize(&value).unwrap();
        bytes.push(0x2a);

        let mut reader = BufferReader::new(&bytes);
        let _: serde::de::IgnoredAny = deserialize_from(&mut reader).unwrap();
        let next: u8 = deserialize_from(&mut reader).unwrap();
        assert_eq!(next, 0x2a);
    }

    #[test]
    fn test_serialize_into_writer() {
        let mut writer = BufferWriter::new();
        serialize_into(&S::default(), &mut writer).unwrap();
        serialize_into(&7u8, &mut writer).unwrap();

        let mut reader = BufferReader::new(writer.as_bytes());
        let s: S = deserialize_from(&mut reader).unwrap();
        assert_eq!(s, S::default());
        assert_eq!(deserialize_from::<u8, _>(&mut reader).unwrap(), 7);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_integer_arrays_are_packed() {
        let packed = serialize(&vec![1u32; 100]).unwrap();
        let unpacked = serialize(&vec![true; 100]).unwrap();

        assert_eq!(packed[0], consts::PREFIX_BINARY);
        // tag, u16 length (3 bytes), payload
        assert_eq!(packed.len(), 1 + 3 + 400);
        assert_eq!(unpacked[0], consts::PREFIX_ARRAY);
    }
}
