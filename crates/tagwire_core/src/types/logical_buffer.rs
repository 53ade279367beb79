//! Fixed-capacity storage with a live element count.
//!
//! On the wire a logical buffer is indistinguishable from a sequence of its
//! live elements. Decoding never writes past the capacity: a declared count or
//! byte length that does not fit fails with `InvalidContainerLength`.

use std::{fmt, marker::PhantomData};

use serde::{
    de::{self, DeserializeSeed, SeqAccess, Visitor},
    ser, Deserialize, Deserializer, Serialize, Serializer,
};

use crate::ser_de::Error;

/// Integer types usable as the count of a logical buffer.
pub trait BufferSize: Copy + Default + fmt::Debug {
    fn to_usize(self) -> usize;

    /// `None` when `n` does not fit.
    fn from_usize(n: usize) -> Option<Self>;
}

macro_rules! impl_buffer_size {
    ($($t: ty),+) => {
        $(
            impl BufferSize for $t {
                fn to_usize(self) -> usize {
                    self as usize
                }

                fn from_usize(n: usize) -> Option<Self> {
                    <$t>::try_from(n).ok()
                }
            }
        )+
    };
}

impl_buffer_size!(u8, u16, u32, u64, usize);

/// Elements still to come may not push the count past `capacity`
fn check_remaining<'de, A: SeqAccess<'de>>(
    seq: &A,
    len: usize,
    capacity: usize,
    exp: &dyn de::Expected,
) -> Result<(), A::Error> {
    match seq.size_hint() {
        Some(rest) if rest > capacity - len => Err(de::Error::invalid_length(len + rest, exp)),
        _ => Ok(()),
    }
}

/// Owned fixed-capacity buffer of `N` elements, counted with `S`.
#[derive(Clone)]
pub struct LogicalBuffer<T, const N: usize, S: BufferSize = usize> {
    items: [T; N],
    count: S,
}

impl<T: Default, const N: usize, S: BufferSize> LogicalBuffer<T, N, S> {
    pub fn new() -> Self {
        Self {
            items: std::array::from_fn(|_| T::default()),
            count: S::default(),
        }
    }

    /// Remove the last live element.
    pub fn pop(&mut self) -> Option<T> {
        let len = self.len().checked_sub(1)?;
        self.count = S::from_usize(len)?;
        Some(std::mem::take(&mut self.items[len]))
    }

    pub fn clear(&mut self) {
        self.as_mut_slice().iter_mut().for_each(|item| *item = T::default());
        self.count = S::default();
    }
}

impl<T, const N: usize, S: BufferSize> LogicalBuffer<T, N, S> {
    /// Append an element, handing it back when the buffer is full.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        let len = self.len();
        let count = match len < N {
            true => S::from_usize(len + 1),
            false => None,
        };

        match count {
            Some(count) => {
                self.items[len] = value;
                self.count = count;
                Ok(())
            }
            None => Err(value),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len()]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        &mut self.items[..len]
    }

    pub fn len(&self) -> usize {
        self.count.to_usize()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T: Default, const N: usize, S: BufferSize> Default for LogicalBuffer<T, N, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, const N: usize, S: BufferSize> fmt::Debug for LogicalBuffer<T, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalBuffer")
            .field("items", &self.as_slice())
            .field("capacity", &N)
            .finish()
    }
}

impl<T: PartialEq, const N: usize, S: BufferSize> PartialEq for LogicalBuffer<T, N, S> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, const N: usize, S: BufferSize> Eq for LogicalBuffer<T, N, S> {}

impl<T: Clone + Default, const N: usize, S: BufferSize> TryFrom<&[T]> for LogicalBuffer<T, N, S> {
    type Error = Error;

    fn try_from(value: &[T]) -> Result<Self, Self::Error> {
        let mut buffer = Self::new();
        for item in value {
            buffer
                .push(item.clone())
                .map_err(|_| Error::InvalidContainerLength)?;
        }
        Ok(buffer)
    }
}

impl<T: Serialize, const N: usize, S: BufferSize> Serialize for LogicalBuffer<T, N, S> {
    fn serialize<Se>(&self, serializer: Se) -> Result<Se::Ok, Se::Error>
    where
        Se: Serializer,
    {
        serializer.collect_seq(self.as_slice())
    }
}

impl<'de, T, const N: usize, S> Deserialize<'de> for LogicalBuffer<T, N, S>
where
    T: Deserialize<'de> + Default,
    S: BufferSize,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BufferVisitor<T, const N: usize, S>(PhantomData<(T, S)>);

        impl<'de, T, const N: usize, S> Visitor<'de> for BufferVisitor<T, N, S>
        where
            T: Deserialize<'de> + Default,
            S: BufferSize,
        {
            type Value = LogicalBuffer<T, N, S>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a sequence of at most {} elements", N)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut buffer = LogicalBuffer::new();
                loop {
                    check_remaining(&seq, buffer.len(), N, &self)?;
                    let Some(item) = seq.next_element()? else {
                        return Ok(buffer);
                    };
                    if buffer.push(item).is_err() {
                        return Err(de::Error::invalid_length(N + 1, &self));
                    }
                }
            }
        }

        deserializer.deserialize_seq(BufferVisitor::<T, N, S>(PhantomData))
    }
}

/// Logical buffer over caller-owned storage: an element slice and a separate count.
///
/// ```
/// use serde::de::DeserializeSeed;
/// use tagwire_core::{
///     ser_de::{serialize, Deserializer},
///     stream::BufferReader,
///     types::LogicalBufferRef,
/// };
///
/// #[derive(Default)]
/// struct Frame {
///     samples: [i16; 8],
///     count: u8,
/// }
///
/// let bytes = serialize(&vec![-3i16, 4]).unwrap();
///
/// let mut frame = Frame::default();
/// let mut view = LogicalBufferRef::new(&mut frame.samples, &mut frame.count);
/// view.seed()
///     .deserialize(&mut Deserializer::new(BufferReader::new(&bytes)))
///     .unwrap();
///
/// assert_eq!(frame.count, 2);
/// assert_eq!(&frame.samples[..2], &[-3, 4]);
/// ```
#[derive(Debug)]
pub struct LogicalBufferRef<'a, T, S: BufferSize = usize> {
    items: &'a mut [T],
    count: &'a mut S,
}

impl<'a, T, S: BufferSize> LogicalBufferRef<'a, T, S> {
    pub fn new(items: &'a mut [T], count: &'a mut S) -> Self {
        Self { items, count }
    }

    /// Live elements. A count past the capacity is clamped here and rejected when encoding.
    pub fn as_slice(&self) -> &[T] {
        let len = self.count.to_usize().min(self.items.len());
        &self.items[..len]
    }

    pub fn len(&self) -> usize {
        self.count.to_usize()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Seed decoding into the underlying storage.
    pub fn seed(&mut self) -> LogicalBufferSeed<'_, T, S> {
        LogicalBufferSeed {
            items: &mut *self.items,
            count: &mut *self.count,
        }
    }
}

impl<'a, T: Serialize, S: BufferSize> Serialize for LogicalBufferRef<'a, T, S> {
    fn serialize<Se>(&self, serializer: Se) -> Result<Se::Ok, Se::Error>
    where
        Se: Serializer,
    {
        if self.len() > self.capacity() {
            return Err(ser::Error::custom(format!(
                "logical buffer count {} exceeds its capacity {}",
                self.len(),
                self.capacity()
            )));
        }
        serializer.collect_seq(self.as_slice())
    }
}

/// Decodes a sequence in place, setting the count once every element is read.
pub struct LogicalBufferSeed<'b, T, S: BufferSize> {
    items: &'b mut [T],
    count: &'b mut S,
}

impl<'de, 'b, T, S> DeserializeSeed<'de> for LogicalBufferSeed<'b, T, S>
where
    T: Deserialize<'de>,
    S: BufferSize,
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        *self.count = S::default();
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'b, T, S> Visitor<'de> for LogicalBufferSeed<'b, T, S>
where
    T: Deserialize<'de>,
    S: BufferSize,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a sequence of at most {} elements", self.items.len())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let capacity = self.items.len();
        let mut len = 0;
        loop {
            check_remaining(&seq, len, capacity, &self)?;
            let Some(item) = seq.next_element()? else {
                break;
            };
            match self.items.get_mut(len) {
                Some(slot) => *slot = item,
                None => return Err(de::Error::invalid_length(capacity + 1, &self)),
            }
            len += 1;
        }

        *self.count = S::from_usize(len).ok_or_else(|| de::Error::invalid_length(len, &self))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ser_de::{self, deserialize, encoded_size, serialize},
        stream::BufferReader,
    };

    fn decode_into<T, S>(bytes: &[u8], items: &mut [T], count: &mut S) -> ser_de::SerDeResult<()>
    where
        T: for<'de> Deserialize<'de>,
        S: BufferSize,
    {
        let mut de = ser_de::Deserializer::new(BufferReader::new(bytes));
        LogicalBufferRef::new(items, count).seed().deserialize(&mut de)
    }

    #[test]
    fn test_push_until_full() {
        let mut buffer = LogicalBuffer::<u32, 3, u8>::new();
        assert!(buffer.is_empty());
        for i in 0..3 {
            buffer.push(i).unwrap();
        }
        assert_eq!(buffer.push(9), Err(9));
        assert_eq!(buffer.as_slice(), &[0, 1, 2]);
        assert_eq!(buffer.capacity(), 3);

        assert_eq!(buffer.pop(), Some(2));
        buffer.clear();
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_count_type_limits_length() {
        let mut buffer = LogicalBuffer::<bool, 300, u8>::new();
        for _ in 0..255 {
            buffer.push(true).unwrap();
        }
        assert_eq!(buffer.push(false), Err(false));

        let slice = [1u8; 4];
        assert!(matches!(
            LogicalBuffer::<u8, 3>::try_from(&slice[..]),
            Err(Error::InvalidContainerLength)
        ));
    }

    #[test]
    fn test_wire_matches_sequence() {
        let ints = LogicalBuffer::<u16, 8>::try_from(&[1u16, 2, 3][..]).unwrap();
        let bytes = serialize(&ints).unwrap();
        assert_eq!(bytes, serialize(&vec![1u16, 2, 3]).unwrap());
        assert_eq!(bytes[0], ser_de::consts::PREFIX_BINARY);
        assert_eq!(encoded_size(&ints).unwrap(), bytes.len());
        assert_eq!(deserialize::<LogicalBuffer<u16, 8>>(&bytes).unwrap(), ints);

        let names =
            LogicalBuffer::<String, 4, u8>::try_from(&["a".to_string(), "bc".to_string()][..])
                .unwrap();
        let bytes = serialize(&names).unwrap();
        assert_eq!(bytes[0], ser_de::consts::PREFIX_ARRAY);
        assert_eq!(deserialize::<LogicalBuffer<String, 4, u8>>(&bytes).unwrap(), names);

        let empty = LogicalBuffer::<i64, 2>::new();
        assert_eq!(
            deserialize::<LogicalBuffer<i64, 2>>(&serialize(&empty).unwrap()).unwrap(),
            empty
        );
    }

    #[test]
    fn test_decode_over_capacity_fails() {
        let too_many_ints = serialize(&vec![7u32; 5]).unwrap();
        assert!(matches!(
            deserialize::<LogicalBuffer<u32, 4>>(&too_many_ints),
            Err(Error::InvalidContainerLength)
        ));

        let too_many_strings = serialize(&vec!["x"; 3]).unwrap();
        assert!(matches!(
            deserialize::<LogicalBuffer<String, 2>>(&too_many_strings),
            Err(Error::InvalidContainerLength)
        ));
    }

    #[test]
    fn test_malformed_binary_length() {
        // 3 bytes cannot hold whole u16 elements
        let bytes = [ser_de::consts::PREFIX_BINARY, 0x03, 1, 2, 3];
        assert!(matches!(
            deserialize::<LogicalBuffer<u16, 8>>(&bytes),
            Err(Error::InvalidContainerLength)
        ));
    }

    #[test]
    fn test_view_decodes_in_place() {
        let mut items = [0i32; 4];
        let mut count = 0u16;

        decode_into(&serialize(&vec![5i32, -6, 7]).unwrap(), &mut items, &mut count).unwrap();
        assert_eq!(count, 3);
        assert_eq!(items, [5, -6, 7, 0]);

        let over = serialize(&vec![1i32; 5]).unwrap();
        assert!(matches!(
            decode_into(&over, &mut items, &mut count),
            Err(Error::InvalidContainerLength)
        ));
        assert_eq!(count, 0);
    }

    #[test]
    fn test_view_rejects_count_past_capacity() {
        let mut items = [1u8, 2];
        let mut count = 2usize;
        assert_eq!(
            serialize(&LogicalBufferRef::new(&mut items, &mut count)).unwrap(),
            serialize(&vec![1u8, 2]).unwrap()
        );

        let mut count = 3usize;
        let view = LogicalBufferRef::new(&mut items, &mut count);
        assert_eq!(view.as_slice(), &[1, 2]);
        assert!(matches!(serialize(&view), Err(Error::Custom(_))));
    }
}
