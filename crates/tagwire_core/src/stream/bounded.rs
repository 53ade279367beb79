//! Size-limited views over a parent stream.
//!
//! A bounded stream carves a sub-message out of a larger stream. Every
//! operation is checked against `capacity - size` before it reaches the
//! parent, so a rejected operation never moves the parent's cursor.

use super::{Reader, Writer};
use crate::ser_de::{EncodingByte, Error, SerDeResult};

/// Reader that refuses to consume more than `capacity` bytes of its parent.
#[derive(Debug)]
pub struct BoundedReader<R: Reader> {
    parent: R,
    capacity: usize,
    consumed: usize,
}

impl<R: Reader> BoundedReader<R> {
    pub fn new(parent: R, capacity: usize) -> Self {
        Self {
            parent,
            capacity,
            consumed: 0,
        }
    }

    /// True once the whole ceiling has been consumed
    pub fn is_empty(&self) -> bool {
        self.consumed == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes consumed so far
    pub fn size(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.consumed
    }

    /// Discard everything left up to the ceiling.
    pub fn read_padding(&mut self) -> SerDeResult<()> {
        self.skip(self.remaining())
    }

    pub fn into_inner(self) -> R {
        self.parent
    }

    fn check(&self, n: usize) -> SerDeResult<()> {
        match n <= self.remaining() {
            true => Ok(()),
            false => {
                log::trace!(
                    "bounded read of {} bytes rejected, {} of {} consumed",
                    n,
                    self.consumed,
                    self.capacity
                );
                Err(Error::BufferExhausted {
                    requested: n,
                    remaining: self.remaining(),
                })
            }
        }
    }
}

impl<R: Reader> Reader for BoundedReader<R> {
    fn ensure(&mut self, n: usize) -> SerDeResult<()> {
        self.check(n)?;
        self.parent.ensure(n)
    }

    fn read_tag(&mut self) -> SerDeResult<EncodingByte> {
        self.check(1)?;
        let tag = self.parent.read_tag()?;
        self.consumed += 1;
        Ok(tag)
    }

    fn read_raw(&mut self, dest: &mut [u8]) -> SerDeResult<()> {
        self.check(dest.len())?;
        self.parent.read_raw(dest)?;
        self.consumed += dest.len();
        Ok(())
    }

    fn skip(&mut self, n: usize) -> SerDeResult<()> {
        self.check(n)?;
        self.parent.skip(n)?;
        self.consumed += n;
        Ok(())
    }

    fn get_handle(&mut self, reference: i64) -> SerDeResult<i32> {
        self.parent.get_handle(reference)
    }
}

/// Writer that refuses to produce more than `capacity` bytes into its parent.
#[derive(Debug)]
pub struct BoundedWriter<W: Writer> {
    parent: W,
    capacity: usize,
    written: usize,
}

impl<W: Writer> BoundedWriter<W> {
    pub fn new(parent: W, capacity: usize) -> Self {
        Self {
            parent,
            capacity,
            written: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.written == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.written
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.written
    }

    /// Zero-fill up to the ceiling so the sub-message has its full declared size.
    pub fn write_padding_to_end(&mut self) -> SerDeResult<()> {
        self.write_padding(self.remaining())
    }

    pub fn into_inner(self) -> W {
        self.parent
    }

    fn check(&self, n: usize) -> SerDeResult<()> {
        match n <= self.remaining() {
            true => Ok(()),
            false => Err(Error::BufferExhausted {
                requested: n,
                remaining: self.remaining(),
            }),
        }
    }
}

impl<W: Writer> Writer for BoundedWriter<W> {
    fn prepare(&mut self, n: usize) -> SerDeResult<()> {
        self.check(n)?;
        self.parent.prepare(n)
    }

    fn write_tag(&mut self, tag: EncodingByte) -> SerDeResult<()> {
        self.check(1)?;
        self.parent.write_tag(tag)?;
        self.written += 1;
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()> {
        self.check(bytes.len())?;
        self.parent.write_raw(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    fn write_padding(&mut self, n: usize) -> SerDeResult<()> {
        self.check(n)?;
        self.parent.write_padding(n)?;
        self.written += n;
        Ok(())
    }

    fn push_handle(&mut self, raw: i32) -> SerDeResult<i64> {
        self.parent.push_handle(raw)
    }

    fn flush(&mut self) -> SerDeResult<()> {
        self.parent.flush()
    }
}
