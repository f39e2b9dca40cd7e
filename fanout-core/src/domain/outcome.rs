//! Task outcome types
//!
//! A pipeline run has one producer task and one consumer task per leg.
//! Each of them finishes with exactly one outcome.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TaskError;

/// Identity of a task within a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskId {
    Producer,
    Consumer { leg: usize, destination: String },
}

impl TaskId {
    pub fn consumer(leg: usize, destination: impl Into<String>) -> Self {
        Self::Consumer {
            leg,
            destination: destination.into(),
        }
    }

    /// Leg index for consumer tasks
    pub fn leg(&self) -> Option<usize> {
        match self {
            Self::Producer => None,
            Self::Consumer { leg, .. } => Some(*leg),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => write!(f, "producer"),
            Self::Consumer { leg, destination } => write!(f, "consumer[{}] {}", leg, destination),
        }
    }
}

/// Terminal status of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Succeeded,
    Failed(TaskError),
}

/// Result reported by a task when it finishes
///
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: TaskId,
    pub status: TaskStatus,
    /// Bytes written (producer) or delivered to the destination (consumer)
    pub bytes: u64,
    /// Non-fatal teardown problems, e.g. a file that failed to close cleanly
    pub warnings: Vec<String>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl TaskOutcome {
    pub fn succeeded(task: TaskId, bytes: u64) -> Self {
        Self {
            task,
            status: TaskStatus::Succeeded,
            bytes,
            warnings: Vec::new(),
            finished_at: chrono::Utc::now(),
        }
    }

    pub fn failed(task: TaskId, error: TaskError) -> Self {
        Self {
            task,
            status: TaskStatus::Failed(error),
            bytes: 0,
            warnings: Vec::new(),
            finished_at: chrono::Utc::now(),
        }
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded)
    }

    pub fn error(&self) -> Option<&TaskError> {
        match &self.status {
            TaskStatus::Succeeded => None,
            TaskStatus::Failed(error) => Some(error),
        }
    }
}
