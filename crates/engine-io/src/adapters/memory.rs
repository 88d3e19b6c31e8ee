//! # In-Memory Data Objects
//!
//! A shared growable byte buffer usable as operation input or output.
//! Clones share the same bytes, so the caller keeps one handle and gives
//! the other to the operation.

use crate::adapters::channels::{BoxReader, BoxWriter};
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
struct Inner {
    bytes: Vec<u8>,
    pos: usize,
}

/// Memory-backed data object.
#[derive(Debug, Clone, Default)]
pub struct MemoryData {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Object positioned at the start of `bytes`.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                bytes: bytes.into(),
                pos: 0,
            })),
        }
    }

    /// Copy of everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().bytes.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move the read position back to the start.
    pub fn rewind(&self) {
        self.inner.lock().pos = 0;
    }

    #[must_use]
    pub fn boxed_reader(&self) -> BoxReader {
        Box::new(self.clone())
    }

    #[must_use]
    pub fn boxed_writer(&self) -> BoxWriter {
        Box::new(self.clone())
    }
}

impl AsyncRead for MemoryData {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut inner = self.inner.lock();
        let start = inner.pos.min(inner.bytes.len());
        let n = buf.remaining().min(inner.bytes.len() - start);
        buf.put_slice(&inner.bytes[start..start + n]);
        inner.pos = start + n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MemoryData {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut inner = self.inner.lock();
        if inner.bytes.try_reserve(buf.len()).is_err() {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::OutOfMemory)));
        }
        inner.bytes.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
