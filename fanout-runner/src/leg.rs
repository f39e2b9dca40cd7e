//! Stream legs
//!
//! A leg is a bounded handoff between the duplicator (single writer) and one
//! consumer task (single reader).
//!
//! ```text
//!   LegWriter ──▶ [mpsc channel, `capacity` chunks] ──▶ LegReader
//!                 ├── writer waits while the channel is full (backpressure)
//!                 ├── reader waits while the channel is empty
//!                 ├── close writer → reader drains, then EOF
//!                 └── drop/close reader → writer gets ReaderClosed
//! ```
//!
//! Chunks are `Bytes`, so one producer chunk is shared by every leg without
//! copying.

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

/// Errors raised when handing a chunk to a leg
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegError {
    /// The writer end was already closed
    #[error("leg {0} is closed")]
    Closed(usize),

    /// The consumer stopped reading (reader dropped or closed)
    #[error("reader of leg {0} has gone away")]
    ReaderClosed(usize),
}

impl LegError {
    pub fn leg(&self) -> usize {
        match self {
            Self::Closed(leg) | Self::ReaderClosed(leg) => *leg,
        }
    }
}

/// Writer side of a leg, as seen by the duplicator
///
/// Implemented by [`LegWriter`]; tests plug in doubles to inject failures.
#[async_trait]
pub trait LegSink: Send {
    /// Index of this leg within the run
    fn index(&self) -> usize;

    /// Hands a chunk to the reader, waiting while the leg is full
    async fn send(&mut self, chunk: Bytes) -> Result<(), LegError>;

    /// Closes the writer end
    ///
    /// Returns `true` only for the call that actually closed the leg.
    fn close(&mut self) -> bool;

    fn is_closed(&self) -> bool;
}

/// Shared count of leg bytes a consumer has delivered to its destination
///
/// Advanced by the consumer after each successful write downstream, so it
/// stays accurate when the consumer fails midway.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::AcqRel);
    }
}

/// Creates a leg with room for `capacity` pending chunks
pub fn leg(index: usize, capacity: usize) -> (LegWriter, LegReader) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        LegWriter {
            index,
            sender: Some(sender),
        },
        LegReader {
            index,
            receiver,
            pending: Bytes::new(),
            delivered: ByteCounter::default(),
        },
    )
}

/// Writing end of a leg
#[derive(Debug)]
pub struct LegWriter {
    index: usize,
    sender: Option<mpsc::Sender<Bytes>>,
}

#[async_trait]
impl LegSink for LegWriter {
    fn index(&self) -> usize {
        self.index
    }

    async fn send(&mut self, chunk: Bytes) -> Result<(), LegError> {
        let sender = self.sender.as_ref().ok_or(LegError::Closed(self.index))?;
        sender
            .send(chunk)
            .await
            .map_err(|_| LegError::ReaderClosed(self.index))
    }

    fn close(&mut self) -> bool {
        self.sender.take().is_some()
    }

    fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}

/// Reading end of a leg
///
/// Implements `AsyncRead`; returns EOF once the writer is closed and every
/// in-flight chunk has been read.
#[derive(Debug)]
pub struct LegReader {
    index: usize,
    receiver: mpsc::Receiver<Bytes>,
    /// Remainder of a chunk that did not fit the caller's buffer
    pending: Bytes,
    delivered: ByteCounter,
}

impl LegReader {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Handle to the number of bytes delivered downstream so far
    pub fn delivered(&self) -> ByteCounter {
        self.delivered.clone()
    }

    /// Stops accepting chunks; pending writes fail with `ReaderClosed`
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl AsyncRead for LegReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        while this.pending.is_empty() {
            match ready!(this.receiver.poll_recv(cx)) {
                Some(chunk) => this.pending = chunk,
                // Writer closed and channel drained
                None => return Poll::Ready(Ok(())),
            }
        }

        let n = buf.remaining().min(this.pending.len());
        buf.put_slice(&this.pending[..n]);
        this.pending.advance(n);

        Poll::Ready(Ok(()))
    }
}
