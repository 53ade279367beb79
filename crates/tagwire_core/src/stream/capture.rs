//! Streams that keep a copy of what they read.

use super::{BufferReader, Reader};
use crate::ser_de::{EncodingByte, SerDeResult};

/// Reader that records every byte it takes from its parent.
///
/// Skipped bytes are read and recorded too, so the copy is always the exact
/// sequence the parent gave up.
#[derive(Debug)]
pub struct CaptureReader<R: Reader> {
    parent: R,
    captured: Vec<u8>,
}

impl<R: Reader> CaptureReader<R> {
    pub fn new(parent: R) -> Self {
        Self {
            parent,
            captured: Vec::new(),
        }
    }

    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    /// Split into the parent and the recorded bytes.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        (self.parent, self.captured)
    }
}

impl<R: Reader> Reader for CaptureReader<R> {
    fn ensure(&mut self, n: usize) -> SerDeResult<()> {
        self.parent.ensure(n)
    }

    fn read_tag(&mut self) -> SerDeResult<EncodingByte> {
        let tag = self.parent.read_tag()?;
        self.captured.push(tag.to_u8());
        Ok(tag)
    }

    fn read_raw(&mut self, dest: &mut [u8]) -> SerDeResult<()> {
        self.parent.read_raw(dest)?;
        self.captured.extend_from_slice(dest);
        Ok(())
    }

    fn skip(&mut self, n: usize) -> SerDeResult<()> {
        // the parent vouches for `n` before anything is allocated
        self.parent.ensure(n)?;

        let start = self.captured.len();
        self.captured.resize(start + n, 0);
        let res = self.parent.read_raw(&mut self.captured[start..]);
        if res.is_err() {
            self.captured.truncate(start);
        }
        res
    }

    fn get_handle(&mut self, reference: i64) -> SerDeResult<i32> {
        self.parent.get_handle(reference)
    }
}

/// Reader over previously captured bytes.
///
/// Handle references are still resolved by the stream the bytes came from.
#[derive(Debug)]
pub struct ReplayReader<'a, R: Reader> {
    bytes: BufferReader<'a>,
    origin: R,
}

impl<'a, R: Reader> ReplayReader<'a, R> {
    pub fn new(bytes: &'a [u8], origin: R) -> Self {
        Self {
            bytes: BufferReader::new(bytes),
            origin,
        }
    }

    /// Bytes not yet replayed
    pub fn remaining(&self) -> usize {
        self.bytes.remaining()
    }
}

impl<'a, R: Reader> Reader for ReplayReader<'a, R> {
    fn ensure(&mut self, n: usize) -> SerDeResult<()> {
        self.bytes.ensure(n)
    }

    fn read_raw(&mut self, dest: &mut [u8]) -> SerDeResult<()> {
        self.bytes.read_raw(dest)
    }

    fn skip(&mut self, n: usize) -> SerDeResult<()> {
        self.bytes.skip(n)
    }

    fn get_handle(&mut self, reference: i64) -> SerDeResult<i32> {
        self.origin.get_handle(reference)
    }
}
