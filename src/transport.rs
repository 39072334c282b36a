//! Byte transport between the application processor and the modem.
//!
//! The command layer only needs two operations from the physical link: write
//! one encoded frame, and read whatever bytes have arrived. The read half is
//! owned by the inbound frame loop and the write half by the outbound writer
//! task, so frames from concurrent callers never interleave. Any error from
//! either half is treated as fatal to the link.

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Read chunk size used by [`IoTransport`].
const READ_CHUNK: usize = 512;

/// Write half of a transport.
#[async_trait]
pub trait TransportWriter: Send + 'static {
    /// Write one complete frame.
    async fn send(&mut self, frame: Bytes) -> io::Result<()>;
}

/// Read half of a transport.
#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Wait for the next bytes from the modem.
    ///
    /// Implementations must be cancel safe: dropping the future before it
    /// completes must not lose bytes. End of stream is reported as
    /// [`io::ErrorKind::UnexpectedEof`].
    async fn receive(&mut self) -> io::Result<Bytes>;
}

/// A full-duplex link that can be split into its two halves.
pub trait Transport {
    /// Read half.
    type Reader: TransportReader;
    /// Write half.
    type Writer: TransportWriter;

    /// Split the link.
    fn into_split(self) -> (Self::Reader, Self::Writer);
}

/// Adapter exposing any tokio byte stream as a [`Transport`].
///
/// Serial ports, sockets and in-memory duplex pipes all fit.
#[derive(Debug)]
pub struct IoTransport<T> {
    stream: T,
}

impl<T> IoTransport<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap `stream`.
    #[must_use]
    pub fn new(stream: T) -> Self { Self { stream } }
}

impl<T> Transport for IoTransport<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    type Reader = IoReader<ReadHalf<T>>;
    type Writer = IoWriter<WriteHalf<T>>;

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        let (read, write) = tokio::io::split(self.stream);
        (IoReader::new(read), IoWriter::new(write))
    }
}

/// [`TransportReader`] over an [`AsyncRead`].
#[derive(Debug)]
pub struct IoReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R> IoReader<R> {
    /// Wrap a reader.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }
}

#[async_trait]
impl<R> TransportReader for IoReader<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    async fn receive(&mut self) -> io::Result<Bytes> {
        self.buf.reserve(READ_CHUNK);
        let read = self.inner.read_buf(&mut self.buf).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "modem link closed",
            ));
        }
        Ok(self.buf.split().freeze())
    }
}

/// [`TransportWriter`] over an [`AsyncWrite`].
#[derive(Debug)]
pub struct IoWriter<W> {
    inner: W,
}

impl<W> IoWriter<W> {
    /// Wrap a writer.
    #[must_use]
    pub fn new(inner: W) -> Self { Self { inner } }
}

#[async_trait]
impl<W> TransportWriter for IoWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn send(&mut self, frame: Bytes) -> io::Result<()> {
        self.inner.write_all(&frame).await?;
        self.inner.flush().await
    }
}
