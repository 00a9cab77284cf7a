///! @see: RFC 1950, 2.2. Data format
///   0   1
/// +---+---+
/// |CMF|FLG|   (more-->)
/// +---+---+
/// +=====================+---+---+---+---+
/// |...compressed data...|    ADLER32    |
/// +=====================+---+---+---+---+
///
/// the header is fixed, FDICT is never set and never interpreted on the read side.
/// the read side skips the header and trusts the stream, the trailer is not verified.
use std::io;

use flate2::{Compress, Decompress, FlushCompress, FlushDecompress, Status};
use utils::io::ShortStream;

use crate::adler32::Adler32;

mod async_stream;
mod stream;

pub use async_stream::AsyncZlibStream;
pub use flate2::Compression;
pub use stream::ZlibStream;

pub const ZLIB_HEADER: [u8; 2] = [0x58, 0x85];
pub const ZLIB_TRAILER_LENGTH: usize = 4;

const OUTPUT_RESERVE: usize = 8 * 1024;
const INPUT_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Compress,
    Decompress,
}

fn wrong_direction(mode: CompressionMode) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("zlib stream opened in {:?} mode", mode),
    )
}

/// Write half of the framing: header, raw deflate body, adler32 trailer.
pub(crate) struct Deflater {
    compress: Compress,
    checksum: Adler32,
    header_written: bool,
    finished: bool,
}

impl Deflater {
    pub(crate) fn new(level: Compression) -> Self {
        Self {
            compress: Compress::new(level, false),
            checksum: Adler32::new(),
            header_written: false,
            finished: false,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn deflate(&mut self, input: &[u8], output: &mut Vec<u8>) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "zlib stream already finished",
            ));
        }
        self.write_header(output);
        self.checksum.update(input);
        self.run(input, output, FlushCompress::None)
    }

    pub(crate) fn sync_flush(&mut self, output: &mut Vec<u8>) -> io::Result<()> {
        if self.finished || !self.header_written {
            return Ok(());
        }
        self.run(&[], output, FlushCompress::Sync)
    }

    /// Ends the deflate stream and appends the trailer, the header is still
    /// emitted when nothing was ever written.
    pub(crate) fn finish(&mut self, output: &mut Vec<u8>) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.write_header(output);
        self.run(&[], output, FlushCompress::Finish)?;
        output.extend_from_slice(&self.checksum.checksum().to_be_bytes());
        self.finished = true;
        tracing::trace!(
            "zlib stream finished, in: {}, out: {}, adler32: {:#010x}",
            self.compress.total_in(),
            self.compress.total_out(),
            self.checksum.checksum()
        );
        Ok(())
    }

    fn write_header(&mut self, output: &mut Vec<u8>) {
        if !self.header_written {
            output.extend_from_slice(&ZLIB_HEADER);
            self.header_written = true;
        }
    }

    fn run(&mut self, mut input: &[u8], output: &mut Vec<u8>, flush: FlushCompress) -> io::Result<()> {
        loop {
            output.reserve(OUTPUT_RESERVE);
            let spare = output.capacity() - output.len();
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();
            let status = self
                .compress
                .compress_vec(input, output, flush)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            let consumed = (self.compress.total_in() - before_in) as usize;
            let produced = (self.compress.total_out() - before_out) as usize;
            input = &input[consumed..];

            match status {
                Status::StreamEnd => return Ok(()),
                Status::BufError if consumed == 0 && produced == 0 => return Ok(()),
                _ => {
                    let drained = input.is_empty() && produced < spare;
                    if drained && !matches!(flush, FlushCompress::Finish) {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Read half of the framing: skips the two header bytes and inflates the rest.
pub(crate) struct Inflater {
    decompress: Decompress,
    header_remaining: usize,
    buffer: Box<[u8]>,
    pos: usize,
    end: usize,
    eof: bool,
    finished: bool,
}

impl Inflater {
    pub(crate) fn new() -> Self {
        Self {
            decompress: Decompress::new(false),
            header_remaining: ZLIB_HEADER.len(),
            buffer: vec![0; INPUT_BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            end: 0,
            eof: false,
            finished: false,
        }
    }

    /// Free space for the next read of compressed bytes.
    pub(crate) fn input_space(&mut self) -> &mut [u8] {
        if self.pos > 0 {
            self.buffer.copy_within(self.pos..self.end, 0);
            self.end -= self.pos;
            self.pos = 0;
        }
        &mut self.buffer[self.end..]
    }

    pub(crate) fn commit_input(&mut self, count: usize) {
        if count == 0 {
            self.eof = true;
        } else {
            self.end += count;
        }
    }

    /// Returns `Ok(None)` when more compressed input is needed.
    pub(crate) fn inflate(&mut self, output: &mut [u8]) -> io::Result<Option<usize>> {
        if output.is_empty() || self.finished {
            return Ok(Some(0));
        }

        if self.header_remaining > 0 {
            let skip = (self.end - self.pos).min(self.header_remaining);
            self.pos += skip;
            self.header_remaining -= skip;
            if self.header_remaining > 0 {
                if self.eof {
                    return Err(ShortStream {
                        expected: ZLIB_HEADER.len(),
                        actual: ZLIB_HEADER.len() - self.header_remaining,
                    }
                    .into());
                }
                return Ok(None);
            }
        }

        let before_in = self.decompress.total_in();
        let before_out = self.decompress.total_out();
        let status = self
            .decompress
            .decompress(&self.buffer[self.pos..self.end], output, FlushDecompress::None)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        self.pos += (self.decompress.total_in() - before_in) as usize;
        let produced = (self.decompress.total_out() - before_out) as usize;

        match status {
            Status::StreamEnd => {
                self.finished = true;
                Ok(Some(produced))
            }
            _ if produced > 0 => Ok(Some(produced)),
            _ if self.eof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "deflate stream ended before its final block",
            )),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::{Compression, read::ZlibDecoder};

    use super::{Deflater, Inflater, ZLIB_HEADER};
    use crate::adler32::adler32;

    fn deflate_all(data: &[u8]) -> Vec<u8> {
        let mut deflater = Deflater::new(Compression::default());
        let mut output = Vec::new();
        for piece in data.chunks(1000) {
            deflater.deflate(piece, &mut output).unwrap();
        }
        deflater.finish(&mut output).unwrap();
        output
    }

    #[test]
    fn framing() {
        let data = b"hello hello hello zlib framing".repeat(50);
        let output = deflate_all(&data);
        assert_eq!(output[..2], ZLIB_HEADER);
        assert_eq!(
            output[output.len() - 4..],
            adler32(&data).to_be_bytes()
        );

        let mut decoded = Vec::new();
        ZlibDecoder::new(&output[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn finish_without_writes_still_has_header() {
        let mut deflater = Deflater::new(Compression::default());
        let mut output = Vec::new();
        deflater.finish(&mut output).unwrap();
        assert_eq!(output[..2], ZLIB_HEADER);
        assert_eq!(output[output.len() - 4..], 1u32.to_be_bytes());
        assert!(deflater.is_finished());
        assert!(deflater.deflate(b"late", &mut output).is_err());
    }

    #[test]
    fn sync_flush_makes_data_decodable() {
        let mut deflater = Deflater::new(Compression::default());
        let mut output = Vec::new();
        deflater.deflate(b"partial message", &mut output).unwrap();
        deflater.sync_flush(&mut output).unwrap();

        let mut inflater = Inflater::new();
        let space = inflater.input_space();
        space[..output.len()].copy_from_slice(&output);
        inflater.commit_input(output.len());
        let mut decoded = vec![0; 64];
        let n = inflater.inflate(&mut decoded).unwrap().unwrap();
        assert_eq!(&decoded[..n], b"partial message");
        assert_eq!(inflater.inflate(&mut decoded).unwrap(), None);
    }

    #[test]
    fn inflater_reports_short_header() {
        let mut inflater = Inflater::new();
        inflater.input_space()[0] = 0x58;
        inflater.commit_input(1);
        let mut out = [0u8; 8];
        assert_eq!(inflater.inflate(&mut out).unwrap(), None);
        inflater.commit_input(0);
        let err = inflater.inflate(&mut out).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
        assert_eq!(
            utils::io::ShortStream::from_io_error(&err),
            Some(utils::io::ShortStream {
                expected: 2,
                actual: 1
            })
        );
    }
}
