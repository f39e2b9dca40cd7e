//! Stream duplicator
//!
//! Mirrors every write to all legs. A write returns only when every leg has
//! accepted the chunk; if any leg fails the whole write fails. The
//! duplicator never skips a failed leg, so a stuck or dead consumer stalls
//! (and then fails) the producer instead of losing data silently.

use bytes::Bytes;
use fanout_core::error::TaskError;
use thiserror::Error;
use tracing::debug;

use crate::leg::{LegError, LegReader, LegSink, leg};

/// Errors returned by [`Duplicator::write`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicatorError {
    #[error(transparent)]
    Leg(#[from] LegError),

    /// Every leg has been closed
    #[error("duplicator is closed")]
    Closed,
}

impl DuplicatorError {
    /// Converts into the failure reported by the producer task
    pub fn into_task_error(self) -> TaskError {
        match self {
            Self::Leg(err) => TaskError::LegWrite {
                leg: err.leg(),
                reason: err.to_string(),
            },
            Self::Closed => TaskError::LegWrite {
                leg: 0,
                reason: "all legs are closed".to_string(),
            },
        }
    }
}

/// Fans one byte stream out to N legs
pub struct Duplicator {
    legs: Vec<Box<dyn LegSink>>,
    bytes_written: u64,
}

impl Duplicator {
    /// Wraps existing leg writers
    pub fn new(legs: Vec<Box<dyn LegSink>>) -> Self {
        Self {
            legs,
            bytes_written: 0,
        }
    }

    /// Creates `count` legs with `capacity` pending chunks each
    ///
    /// Returns the duplicator and the reader ends, in leg order.
    pub fn with_legs(count: usize, capacity: usize) -> (Self, Vec<LegReader>) {
        let (writers, readers): (Vec<_>, Vec<_>) =
            (0..count).map(|index| leg(index, capacity)).unzip();

        let legs = writers
            .into_iter()
            .map(|writer| Box::new(writer) as Box<dyn LegSink>)
            .collect();

        (Self::new(legs), readers)
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    pub fn open_legs(&self) -> usize {
        self.legs.iter().filter(|leg| !leg.is_closed()).count()
    }

    /// Total bytes accepted by every leg
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Writes `data` to every leg
    ///
    /// Returns the number of bytes written once all legs accepted them.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, DuplicatorError> {
        if self.open_legs() == 0 {
            return Err(DuplicatorError::Closed);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let chunk = Bytes::copy_from_slice(data);
        for leg in self.legs.iter_mut() {
            leg.send(chunk.clone()).await?;
        }

        self.bytes_written += data.len() as u64;
        Ok(data.len())
    }

    /// Closes every leg that is still open
    ///
    /// Safe to call more than once; returns how many legs this call closed.
    pub fn close(&mut self) -> usize {
        let closed = self
            .legs
            .iter_mut()
            .map(|leg| leg.close())
            .filter(|closed| *closed)
            .count();
        debug!(
            "Closed {} of {} leg(s) after {} bytes",
            closed,
            self.legs.len(),
            self.bytes_written
        );
        closed
    }
}

impl Drop for Duplicator {
    fn drop(&mut self) {
        self.close();
    }
}
