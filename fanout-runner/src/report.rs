//! Run report
//!
//! The coordinator's single decision about a run, built from every task
//! outcome.

use fanout_core::domain::outcome::{TaskId, TaskOutcome};
use fanout_core::error::TaskError;
use serde::Serialize;
use uuid::Uuid;

/// Everything known about a finished pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub name: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    /// One outcome per task, in the order they were reported
    pub outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    /// Success only if every task, producer included, succeeded
    pub fn is_success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(TaskOutcome::is_success)
    }

    /// Every failed outcome, in reporting order
    pub fn failures(&self) -> Vec<&TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    /// The failure reported first; the primary cause shown to users
    pub fn first_failure(&self) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| !o.is_success())
    }

    pub fn producer(&self) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task == TaskId::Producer)
    }

    /// Consumer outcomes ordered by leg
    pub fn consumers(&self) -> Vec<&TaskOutcome> {
        let mut consumers: Vec<_> = self
            .outcomes
            .iter()
            .filter(|o| o.task != TaskId::Producer)
            .collect();
        consumers.sort_by_key(|o| o.task.leg());
        consumers
    }

    /// Outcome of the consumer on `leg`
    pub fn consumer(&self, leg: usize) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task.leg() == Some(leg))
    }

    /// Check if any task ran out of time
    pub fn deadline_exceeded(&self) -> bool {
        self.outcomes
            .iter()
            .filter_map(TaskOutcome::error)
            .any(TaskError::is_deadline)
    }

    /// Non-fatal warnings from every task
    pub fn warnings(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .flat_map(|o| o.warnings.iter().map(String::as_str))
            .collect()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
