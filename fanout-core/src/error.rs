//! Error types shared across fanout crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a pipeline task failed
///
/// Every task failure is converted into one of these and reported as part
/// of a task outcome. Reasons are kept as strings so outcomes can be cloned,
/// compared and serialized.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TaskError {
    /// The producer process could not be started
    #[error("failed to launch producer `{program}`: {reason}")]
    ProducerLaunch { program: String, reason: String },

    /// The producer exited unsuccessfully or its output could not be read
    #[error("producer `{program}` failed: {reason}")]
    ProducerRuntime { program: String, reason: String },

    /// A consumer could not be started
    #[error("failed to launch consumer for {destination} (leg {leg}): {reason}")]
    ConsumerLaunch {
        leg: usize,
        destination: String,
        reason: String,
    },

    /// A consumer exited unsuccessfully or stopped reading early
    #[error("consumer for {destination} (leg {leg}) failed: {reason}")]
    ConsumerRuntime {
        leg: usize,
        destination: String,
        reason: String,
    },

    /// The duplicator could not deliver bytes to a leg
    #[error("failed to deliver bytes to leg {leg}: {reason}")]
    LegWrite { leg: usize, reason: String },

    /// The run's deadline elapsed before the task finished
    #[error("deadline of {deadline_ms}ms exceeded")]
    DeadlineExceeded { deadline_ms: u64 },

    /// The task ended without reporting an outcome (panic or abort)
    #[error("task ended without reporting an outcome")]
    Abandoned,
}

impl TaskError {
    /// Check if this error was caused by the run's deadline
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Check if this error belongs to the producer side
    pub fn is_producer_error(&self) -> bool {
        matches!(
            self,
            Self::ProducerLaunch { .. } | Self::ProducerRuntime { .. } | Self::LegWrite { .. }
        )
    }
}

/// Errors found while validating a pipeline definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("command is empty: '{0}'")]
    EmptyCommand(String),

    #[error("pipeline needs at least one consumer")]
    NoConsumers,

    #[error("duplicate consumer destination: {0}")]
    DuplicateDestination(String),

    #[error("consumer destination cannot be empty (leg {0})")]
    EmptyDestination(usize),

    #[error("deadline must be greater than 0")]
    ZeroDeadline,

    #[error("invalid provision section: {0}")]
    InvalidProvision(String),

    #[error("failed to parse pipeline definition: {0}")]
    Parse(String),
}
