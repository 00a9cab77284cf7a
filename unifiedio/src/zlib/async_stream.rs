use std::{
    io,
    pin::Pin,
    task::{Context, Poll, ready},
};

use flate2::Compression;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::{CompressionMode, Deflater, Inflater, wrong_direction};

/// Suspendable twin of [`super::ZlibStream`], same framing over tokio io.
///
/// `poll_shutdown` writes the trailer, then shuts the inner stream down
/// unless [`AsyncZlibStream::leave_open`] was requested.
pub struct AsyncZlibStream<S> {
    inner: S,
    mode: CompressionMode,
    deflater: Deflater,
    inflater: Inflater,
    pending: Vec<u8>,
    pending_pos: usize,
    flushing: bool,
    leave_open: bool,
}

impl<S> AsyncZlibStream<S> {
    pub fn new(inner: S, mode: CompressionMode) -> Self {
        Self::with_level(inner, mode, Compression::default())
    }

    pub fn with_level(inner: S, mode: CompressionMode, level: Compression) -> Self {
        Self {
            inner,
            mode,
            deflater: Deflater::new(level),
            inflater: Inflater::new(),
            pending: Vec::new(),
            pending_pos: 0,
            flushing: false,
            leave_open: false,
        }
    }

    pub fn leave_open(mut self, leave_open: bool) -> Self {
        self.leave_open = leave_open;
        self
    }

    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncWrite + Unpin> AsyncZlibStream<S> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.pending_pos < self.pending.len() {
            let n = ready!(
                Pin::new(&mut self.inner).poll_write(cx, &self.pending[self.pending_pos..])
            )?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending_pos += n;
        }
        self.pending.clear();
        self.pending_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for AsyncZlibStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.mode != CompressionMode::Compress {
            return Poll::Ready(Err(wrong_direction(this.mode)));
        }
        ready!(this.poll_drain(cx))?;
        this.deflater.deflate(buf, &mut this.pending)?;
        this.flushing = false;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.mode != CompressionMode::Compress {
            return Poll::Ready(Err(wrong_direction(this.mode)));
        }
        if !this.flushing {
            this.deflater.sync_flush(&mut this.pending)?;
            this.flushing = true;
        }
        ready!(this.poll_drain(cx))?;
        this.flushing = false;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.mode == CompressionMode::Compress {
            if !this.deflater.is_finished() {
                this.deflater.finish(&mut this.pending)?;
            }
            ready!(this.poll_drain(cx))?;
            ready!(Pin::new(&mut this.inner).poll_flush(cx))?;
        }
        if this.leave_open {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for AsyncZlibStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.mode != CompressionMode::Decompress {
            return Poll::Ready(Err(wrong_direction(this.mode)));
        }
        loop {
            if let Some(n) = this.inflater.inflate(buf.initialize_unfilled())? {
                buf.advance(n);
                return Poll::Ready(Ok(()));
            }
            let mut input = ReadBuf::new(this.inflater.input_space());
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut input))?;
            let n = input.filled().len();
            this.inflater.commit_input(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::ZlibDecoder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use crate::{
        adler32::adler32,
        zlib::{AsyncZlibStream, CompressionMode, ZLIB_HEADER},
    };

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 97) as u8 ^ 0x5a).collect()
    }

    #[tokio::test]
    async fn shutdown_writes_trailer() {
        let data = sample(40_000);
        let mut stream = AsyncZlibStream::new(Vec::new(), CompressionMode::Compress);
        stream.write_all(&data).await.unwrap();
        stream.shutdown().await.unwrap();
        let wire = stream.into_inner();

        assert_eq!(wire[..2], ZLIB_HEADER);
        assert_eq!(wire[wire.len() - 4..], adler32(&data).to_be_bytes());
        let mut decoded = Vec::new();
        ZlibDecoder::new(&wire[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn round_trip_over_duplex() {
        let data = sample(100_000);
        let (client, server) = duplex(1024);

        let expected = data.clone();
        let reader = tokio::spawn(async move {
            let mut stream = AsyncZlibStream::new(server, CompressionMode::Decompress);
            let mut decoded = Vec::new();
            stream.read_to_end(&mut decoded).await.unwrap();
            assert_eq!(decoded, expected);
        });

        let mut writer = AsyncZlibStream::new(client, CompressionMode::Compress);
        for piece in data.chunks(4096) {
            writer.write_all(piece).await.unwrap();
        }
        writer.shutdown().await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn flush_delivers_written_bytes() {
        let (client, server) = duplex(64 * 1024);
        let mut writer = AsyncZlibStream::new(client, CompressionMode::Compress);
        let mut reader = AsyncZlibStream::new(server, CompressionMode::Decompress);

        writer.write_all(b"ping").await.unwrap();
        writer.flush().await.unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        writer.write_all(b"pong").await.unwrap();
        writer.flush().await.unwrap();
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn leave_open_keeps_inner_writable() {
        let (client, mut server) = duplex(64 * 1024);
        let mut writer =
            AsyncZlibStream::new(client, CompressionMode::Compress).leave_open(true);
        writer.write_all(b"abc").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut inner = writer.into_inner();
        inner.write_all(b"!").await.unwrap();
        drop(inner);

        let mut wire = Vec::new();
        server.read_to_end(&mut wire).await.unwrap();
        assert_eq!(wire[..2], ZLIB_HEADER);
        assert_eq!(*wire.last().unwrap(), b'!');
        assert_eq!(
            wire[wire.len() - 5..wire.len() - 1],
            adler32(b"abc").to_be_bytes()
        );
    }
}
