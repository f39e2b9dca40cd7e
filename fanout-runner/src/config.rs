//! Runner configuration
//!
//! Defines the tunables of a pipeline run: the deadline, the producer's
//! chunk size and how many chunks a leg may hold before the producer waits.

use std::time::Duration;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;
const DEFAULT_LEG_CAPACITY: usize = 1;

/// Runner configuration
///
/// Passed explicitly to the coordinator; nothing is read from globals
/// during a run, so independent runs can share a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Time budget for the whole run, producer and consumers included
    pub deadline: Duration,

    /// Largest chunk read from the producer and handed to the legs
    pub chunk_size: usize,

    /// Chunks a leg may hold before the producer has to wait for its reader
    pub leg_capacity: usize,
}

impl Config {
    /// Creates a configuration with the given deadline and default tunables
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            chunk_size: DEFAULT_CHUNK_SIZE,
            leg_capacity: DEFAULT_LEG_CAPACITY,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Environment variables (all optional):
    /// - FANOUT_DEADLINE_SECS (seconds, default: 30)
    /// - FANOUT_CHUNK_SIZE (bytes, default: 32768)
    /// - FANOUT_LEG_CAPACITY (chunks, default: 1)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str| -> anyhow::Result<Option<u64>> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got '{}'", key, raw)),
                None => Ok(None),
            }
        };

        let deadline = parse("FANOUT_DEADLINE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DEADLINE);

        let chunk_size = parse("FANOUT_CHUNK_SIZE")?
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let leg_capacity = parse("FANOUT_LEG_CAPACITY")?
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_LEG_CAPACITY);

        Ok(Self {
            deadline,
            chunk_size,
            leg_capacity,
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.deadline.is_zero() {
            anyhow::bail!("deadline must be greater than 0");
        }

        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }

        if self.leg_capacity == 0 {
            anyhow::bail!("leg_capacity must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE)
    }
}
