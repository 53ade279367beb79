//! In-memory streams

use super::{Reader, Writer};
use crate::ser_de::{Error, SerDeResult};

/// A cursor over an existing slice of bytes.
///
/// Handles referenced by the payload are resolved through an optional table
/// supplied by whoever produced the bytes.
#[derive(Debug)]
pub struct BufferReader<'a> {
    slice: &'a [u8],
    offset: usize,
    handles: Vec<i32>,
}

impl<'a> BufferReader<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        Self {
            slice,
            offset: 0,
            handles: Vec::new(),
        }
    }

    /// Create a reader that resolves handle references against `handles`.
    pub fn with_handles(slice: &'a [u8], handles: Vec<i32>) -> Self {
        Self {
            slice,
            offset: 0,
            handles,
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.slice.len() - self.offset
    }

    pub fn position(&self) -> usize {
        self.offset
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

impl<'a> Reader for BufferReader<'a> {
    fn ensure(&mut self, n: usize) -> SerDeResult<()> {
        self.check(n)
    }

    fn read_raw(&mut self, dest: &mut [u8]) -> SerDeResult<()> {
        self.check(dest.len())?;
        let end = self.offset + dest.len();
        dest.copy_from_slice(&self.slice[self.offset..end]);
        self.offset = end;
        Ok(())
    }

    fn skip(&mut self, n: usize) -> SerDeResult<()> {
        self.check(n)?;
        self.offset += n;
        Ok(())
    }

    fn get_handle(&mut self, reference: i64) -> SerDeResult<i32> {
        usize::try_from(reference)
            .ok()
            .and_then(|idx| self.handles.get(idx).copied())
            .ok_or(Error::InvalidHandleReference(reference))
    }
}

/// A growable byte buffer with a handle table.
#[derive(Debug, Default)]
pub struct BufferWriter {
    output: Vec<u8>,
    handles: Vec<i32>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            output: Vec::with_capacity(capacity),
            handles: Vec::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.output
    }

    pub fn handles(&self) -> &[i32] {
        &self.handles
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.output
    }

    /// Split into the encoded bytes and the handles they reference.
    pub fn into_parts(self) -> (Vec<u8>, Vec<i32>) {
        (self.output, self.handles)
    }
}

impl Writer for BufferWriter {
    fn prepare(&mut self, n: usize) -> SerDeResult<()> {
        self.output.reserve(n);
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn write_padding(&mut self, n: usize) -> SerDeResult<()> {
        self.output.resize(self.output.len() + n, 0);
        Ok(())
    }

    fn push_handle(&mut self, raw: i32) -> SerDeResult<i64> {
        self.handles.push(raw);
        Ok((self.handles.len() - 1) as i64)
    }
}

/// Counts the bytes that would be written, without storing them.
#[derive(Debug, Default)]
pub struct SizeWriter {
    size: usize,
    handles: usize,
}

impl SizeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Writer for SizeWriter {
    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()> {
        self.size += bytes.len();
        Ok(())
    }

    fn write_padding(&mut self, n: usize) -> SerDeResult<()> {
        self.size += n;
        Ok(())
    }

    // references are assigned the same way as in [BufferWriter] so sizes agree
    fn push_handle(&mut self, _raw: i32) -> SerDeResult<i64> {
        self.handles += 1;
        Ok((self.handles - 1) as i64)
    }
}
