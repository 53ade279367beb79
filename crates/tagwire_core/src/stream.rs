//! Byte streams consumed and produced by the encoding engine.
//!
//! The engine only needs a handful of primitive operations from a transport.
//! [Reader] and [Writer] capture that contract; everything else
//! (buffers, sockets, bounded sub-regions) is an implementation of it.

mod bounded;
mod buffer;
mod capture;
mod io;

pub use bounded::{BoundedReader, BoundedWriter};
pub use buffer::{BufferReader, BufferWriter, SizeWriter};
pub use capture::{CaptureReader, ReplayReader};
pub use io::{StreamReader, StreamWriter};

use crate::ser_de::{EncodingByte, Error, SerDeResult};

/// Source of encoded bytes.
pub trait Reader {
    /// Guarantee that `n` bytes can be read without consuming them.
    fn ensure(&mut self, n: usize) -> SerDeResult<()>;

    /// Read a single prefix byte.
    fn read_tag(&mut self) -> SerDeResult<EncodingByte> {
        let mut tag = [0u8; 1];
        self.read_raw(&mut tag)?;
        Ok(EncodingByte::from_u8(tag[0]))
    }

    /// Fill `dest` completely, or fail without a partial read being reported as success.
    fn read_raw(&mut self, dest: &mut [u8]) -> SerDeResult<()>;

    /// Discard the next `n` bytes.
    fn skip(&mut self, n: usize) -> SerDeResult<()>;

    /// Resolve an out-of-band handle reference into a raw descriptor.
    fn get_handle(&mut self, reference: i64) -> SerDeResult<i32> {
        let _ = reference;
        Err(Error::HandlesUnsupported)
    }
}

/// Sink for encoded bytes.
pub trait Writer {
    /// Reserve room for `n` more bytes. Sinks that grow on demand can ignore this.
    fn prepare(&mut self, n: usize) -> SerDeResult<()> {
        let _ = n;
        Ok(())
    }

    fn write_tag(&mut self, tag: EncodingByte) -> SerDeResult<()> {
        self.write_raw(&[tag.to_u8()])
    }

    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()>;

    /// Write `n` zero bytes.
    fn write_padding(&mut self, n: usize) -> SerDeResult<()> {
        const ZEROS: [u8; 64] = [0u8; 64];
        let mut left = n;
        while left > 0 {
            let chunk = left.min(ZEROS.len());
            self.write_raw(&ZEROS[..chunk])?;
            left -= chunk;
        }
        Ok(())
    }

    /// Hand a raw descriptor to the transport, returning the reference to put on the wire.
    fn push_handle(&mut self, raw: i32) -> SerDeResult<i64> {
        let _ = raw;
        Err(Error::HandlesUnsupported)
    }

    fn flush(&mut self) -> SerDeResult<()> {
        Ok(())
    }
}

impl<R: Reader + ?Sized> Reader for &mut R {
    fn ensure(&mut self, n: usize) -> SerDeResult<()> {
        (**self).ensure(n)
    }

    fn read_tag(&mut self) -> SerDeResult<EncodingByte> {
        (**self).read_tag()
    }

    fn read_raw(&mut self, dest: &mut [u8]) -> SerDeResult<()> {
        (**self).read_raw(dest)
    }

    fn skip(&mut self, n: usize) -> SerDeResult<()> {
        (**self).skip(n)
    }

    fn get_handle(&mut self, reference: i64) -> SerDeResult<i32> {
        (**self).get_handle(reference)
    }
}

impl<W: Writer + ?Sized> Writer for &mut W {
    fn prepare(&mut self, n: usize) -> SerDeResult<()> {
        (**self).prepare(n)
    }

    fn write_tag(&mut self, tag: EncodingByte) -> SerDeResult<()> {
        (**self).write_tag(tag)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()> {
        (**self).write_raw(bytes)
    }

    fn write_padding(&mut self, n: usize) -> SerDeResult<()> {
        (**self).write_padding(n)
    }

    fn push_handle(&mut self, raw: i32) -> SerDeResult<i64> {
        (**self).push_handle(raw)
    }

    fn flush(&mut self) -> SerDeResult<()> {
        (**self).flush()
    }
}
