//! Byte-exact reads.
//!
//! A framing layer asks for `count` bytes and gets either all of them or a
//! [`ShortStream`] telling how many arrived before the stream ended. A short
//! stream is never padded and never confused with other io failures.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("short stream, expected {expected} bytes, got {actual}")]
pub struct ShortStream {
    pub expected: usize,
    pub actual: usize,
}

impl From<ShortStream> for io::Error {
    fn from(value: ShortStream) -> Self {
        io::Error::new(io::ErrorKind::UnexpectedEof, value)
    }
}

impl ShortStream {
    /// Recovers a short stream that travelled through an `io::Error`.
    pub fn from_io_error(err: &io::Error) -> Option<ShortStream> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<ShortStream>())
            .copied()
    }
}

#[derive(Debug, Error)]
pub enum ReadExactError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    ShortStream(#[from] ShortStream),
}

pub type ReadExactResult<T> = Result<T, ReadExactError>;

/// Upper bound of the up front allocation, a length prefix is not trusted beyond it.
const PREALLOCATE_LIMIT: usize = 64 * 1024;

fn check_length(buffer: &[u8], count: usize) -> ReadExactResult<()> {
    if buffer.len() < count {
        return Err(ShortStream {
            expected: count,
            actual: buffer.len(),
        }
        .into());
    }
    Ok(())
}

pub trait ReadExactly: io::Read {
    /// The buffer grows with the bytes that actually arrive.
    fn read_exactly(&mut self, count: usize) -> ReadExactResult<Vec<u8>> {
        let mut buffer = Vec::with_capacity(count.min(PREALLOCATE_LIMIT));
        io::Read::read_to_end(&mut io::Read::take(&mut *self, count as u64), &mut buffer)?;
        check_length(&buffer, count)?;
        Ok(buffer)
    }

    fn read_exactly_into(&mut self, buffer: &mut [u8]) -> ReadExactResult<()> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.read(&mut buffer[filled..]) {
                Ok(0) => {
                    return Err(ShortStream {
                        expected: buffer.len(),
                        actual: filled,
                    }
                    .into());
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

impl<R: io::Read + ?Sized> ReadExactly for R {}

pub async fn read_exactly<R>(reader: &mut R, count: usize) -> ReadExactResult<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = Vec::with_capacity(count.min(PREALLOCATE_LIMIT));
    AsyncReadExt::take(&mut *reader, count as u64)
        .read_to_end(&mut buffer)
        .await?;
    check_length(&buffer, count)?;
    Ok(buffer)
}

pub async fn read_exactly_into<R>(reader: &mut R, buffer: &mut [u8]) -> ReadExactResult<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]).await {
            Ok(0) => {
                return Err(ShortStream {
                    expected: buffer.len(),
                    actual: filled,
                }
                .into());
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
