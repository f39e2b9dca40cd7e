//! Pipeline tasks
//!
//! The coordinator runs one [`Producer`] and one [`Consumer`] per leg. Both
//! are traits so runs can be driven by in-memory doubles as well as by real
//! external processes.

mod consumer;
mod producer;

pub use consumer::{CommandConsumer, FileConsumer};
pub use producer::CommandProducer;

use async_trait::async_trait;
use fanout_core::error::TaskError;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::duplicator::Duplicator;
use crate::leg::{ByteCounter, LegReader};

/// Source of the duplicated stream
#[async_trait]
pub trait Producer: Send + Sync {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Writes the whole stream into `sink`
    ///
    /// Returns the number of bytes produced. Must not close the sink; the
    /// coordinator does that once this returns or is cancelled.
    async fn produce(&self, sink: &mut Duplicator) -> Result<u64, TaskError>;
}

/// What a consumer reports on success
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumeReport {
    /// Bytes delivered to the destination
    pub bytes: u64,
    /// Non-fatal teardown problems
    pub warnings: Vec<String>,
}

/// Reader of one leg
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Destination identifier used in logs and reports
    fn destination(&self) -> &str;

    /// Reads `source` until end-of-stream and delivers it
    ///
    /// Implementations advance `source.delivered()` as bytes reach the
    /// destination; that count is what a failed outcome reports.
    async fn consume(&self, leg: usize, source: LegReader) -> Result<ConsumeReport, TaskError>;
}

const PUMP_BUFFER_SIZE: usize = 8192;

/// Copies `reader` into `writer` until EOF, counting delivered bytes
///
/// `delivered` stays valid when the copy fails or is abandoned midway.
pub(crate) async fn pump<R, W>(reader: &mut R, writer: &mut W, delivered: &ByteCounter) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        delivered.add(n as u64);
    }
    writer.flush().await
}
