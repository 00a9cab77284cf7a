use std::io;

use flate2::Compression;

use super::{CompressionMode, Deflater, Inflater, wrong_direction};

/// Blocking zlib adapter over a raw byte stream.
///
/// In compress mode it implements `io::Write`: the header goes out with the
/// first write, `flush` performs a deflate sync flush, and `finish` appends
/// the adler32 trailer. A compress stream dropped before `finish` has no
/// trailer. In decompress mode it implements `io::Read` and discards the
/// header before inflating.
pub struct ZlibStream<S> {
    inner: Option<S>,
    mode: CompressionMode,
    deflater: Deflater,
    inflater: Inflater,
    pending: Vec<u8>,
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "zlib stream closed")
}

impl<S> ZlibStream<S> {
    pub fn new(inner: S, mode: CompressionMode) -> Self {
        Self::with_level(inner, mode, Compression::default())
    }

    pub fn with_level(inner: S, mode: CompressionMode, level: Compression) -> Self {
        Self {
            inner: Some(inner),
            mode,
            deflater: Deflater::new(level),
            inflater: Inflater::new(),
            pending: Vec::new(),
        }
    }

    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.inner.as_ref()
    }

    fn expect_mode(&self, mode: CompressionMode) -> io::Result<()> {
        if self.mode != mode {
            return Err(wrong_direction(self.mode));
        }
        Ok(())
    }
}

impl<S: io::Write> ZlibStream<S> {
    fn write_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        inner.write_all(&self.pending)?;
        self.pending.clear();
        Ok(())
    }

    /// Writes the trailer in compress mode, the inner stream stays usable.
    pub fn try_finish(&mut self) -> io::Result<()> {
        if self.mode == CompressionMode::Compress && !self.deflater.is_finished() {
            self.deflater.finish(&mut self.pending)?;
            self.write_pending()?;
            self.inner.as_mut().ok_or_else(closed)?.flush()?;
        }
        Ok(())
    }

    /// Finishes the stream and hands back the inner stream, leaving it open.
    pub fn finish(mut self) -> io::Result<S> {
        self.try_finish()?;
        self.inner.take().ok_or_else(closed)
    }
}

impl<S: io::Write> io::Write for ZlibStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.expect_mode(CompressionMode::Compress)?;
        self.deflater.deflate(buf, &mut self.pending)?;
        self.write_pending()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.expect_mode(CompressionMode::Compress)?;
        self.deflater.sync_flush(&mut self.pending)?;
        self.write_pending()?;
        self.inner.as_mut().ok_or_else(closed)?.flush()
    }
}

impl<S: io::Read> io::Read for ZlibStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.expect_mode(CompressionMode::Decompress)?;
        loop {
            if let Some(n) = self.inflater.inflate(buf)? {
                return Ok(n);
            }
            let inner = self.inner.as_mut().ok_or_else(closed)?;
            let n = match inner.read(self.inflater.input_space()) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            self.inflater.commit_input(n);
        }
    }
}

impl<S> Drop for ZlibStream<S> {
    fn drop(&mut self) {
        if self.mode == CompressionMode::Compress
            && self.inner.is_some()
            && !self.deflater.is_finished()
        {
            tracing::debug!("zlib stream dropped before finish, trailer is lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read, Write};

    use flate2::read::ZlibDecoder;

    use crate::{
        adler32::adler32,
        zlib::{CompressionMode, ZLIB_HEADER, ZlibStream},
    };

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 31) % 251) as u8).collect()
    }

    #[test]
    fn compress_wire_format() {
        let data = sample(70_000);
        let mut stream = ZlibStream::new(Vec::new(), CompressionMode::Compress);
        stream.write_all(&data).unwrap();
        let wire = stream.finish().unwrap();

        assert_eq!(wire[..2], ZLIB_HEADER);
        assert_eq!(wire[wire.len() - 4..], adler32(&data).to_be_bytes());

        let mut decoded = Vec::new();
        ZlibDecoder::new(&wire[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn round_trip_through_adapter() {
        let data = sample(12_345);
        let mut writer = ZlibStream::new(Vec::new(), CompressionMode::Compress);
        for piece in data.chunks(777) {
            writer.write_all(piece).unwrap();
        }
        let wire = writer.finish().unwrap();

        let mut reader = ZlibStream::new(&wire[..], CompressionMode::Decompress);
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn flush_then_read_before_finish() {
        let mut writer = ZlibStream::new(Vec::new(), CompressionMode::Compress);
        writer.write_all(b"first").unwrap();
        writer.flush().unwrap();
        let wire = writer.get_ref().unwrap().clone();

        let mut reader = ZlibStream::new(&wire[..], CompressionMode::Decompress);
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"first");
        writer.try_finish().unwrap();
    }

    #[test]
    fn truncated_header_is_short_stream() {
        let mut reader = ZlibStream::new(&[0x58u8][..], CompressionMode::Decompress);
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn wrong_direction_is_rejected() {
        let mut writer = ZlibStream::new(Cursor::new(Vec::new()), CompressionMode::Compress);
        let mut buf = [0u8; 4];
        assert_eq!(
            writer.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );

        let mut reader = ZlibStream::new(Cursor::new(Vec::new()), CompressionMode::Decompress);
        assert_eq!(
            reader.write(b"x").unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );
    }
}
