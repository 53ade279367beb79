//! Streams over blocking [std::io] transports.
//!
//! Both types own their transport. Dropping them releases it; the writer
//! flushes whatever is still buffered first.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

use super::{Reader, Writer};
use crate::ser_de::SerDeResult;

/// Buffered reader over any [io::Read] transport.
#[derive(Debug)]
pub struct StreamReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Reader for StreamReader<R> {
    // a blocking transport only needs to prove it is not at end of stream,
    // later reads wait for the remaining bytes
    fn ensure(&mut self, n: usize) -> SerDeResult<()> {
        if n == 0 {
            return Ok(());
        }
        match self.inner.fill_buf()?.is_empty() {
            false => Ok(()),
            true => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        }
    }

    fn read_raw(&mut self, dest: &mut [u8]) -> SerDeResult<()> {
        self.inner.read_exact(dest)?;
        Ok(())
    }

    fn skip(&mut self, n: usize) -> SerDeResult<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(n as u64), &mut io::sink())?;
        match skipped == n as u64 {
            true => Ok(()),
            false => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        }
    }
}

/// Buffered writer over any [io::Write] transport.
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
        }
    }

    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Flush buffered bytes and return the transport.
    pub fn into_inner(self) -> SerDeResult<W> {
        self.inner
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

impl<W: Write> Writer for StreamWriter<W> {
    fn write_raw(&mut self, bytes: &[u8]) -> SerDeResult<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> SerDeResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser_de::{EncodingByte, Error};

    #[test]
    fn test_stream_roundtrip_over_cursor() {
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_tag(EncodingByte::Binary).unwrap();
        writer.write_raw(&[4, 1, 2, 3, 4]).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = StreamReader::new(io::Cursor::new(bytes));
        reader.ensure(1).unwrap();
        assert_eq!(reader.read_tag().unwrap(), EncodingByte::Binary);
        reader.skip(1).unwrap();
        let mut dest = [0u8; 4];
        reader.read_raw(&mut dest).unwrap();
        assert_eq!(dest, [1, 2, 3, 4]);
    }

    #[test]
    fn test_eof_is_transport_error() {
        let mut reader = StreamReader::new(io::Cursor::new(vec![1u8, 2]));
        let err = reader.skip(3).unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(reader.ensure(1), Err(Error::Io(_))));
    }
}
