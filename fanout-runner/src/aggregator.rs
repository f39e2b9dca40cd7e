//! Result aggregator
//!
//! Collects task outcomes from concurrently running tasks. Each task gets an
//! [`OutcomeReporter`]; reporting consumes it, so a task can post at most one
//! outcome. A reporter dropped without reporting (the task panicked or was
//! aborted) posts [`TaskError::Abandoned`] instead, so every task is
//! accounted for exactly once.
//!
//! The "all done" signal is the channel closing: [`OutcomeAggregator::collect`]
//! completes once every reporter is gone.

use fanout_core::domain::outcome::{TaskId, TaskOutcome};
use fanout_core::error::TaskError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Append-only sink for task outcomes
pub struct OutcomeAggregator {
    sender: mpsc::UnboundedSender<TaskOutcome>,
    receiver: mpsc::UnboundedReceiver<TaskOutcome>,
    issued: usize,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            issued: 0,
        }
    }

    /// Hands out the reporter for one task
    pub fn reporter(&mut self, task: TaskId) -> OutcomeReporter {
        self.issued += 1;
        OutcomeReporter {
            task,
            sender: Some(self.sender.clone()),
        }
    }

    /// Number of reporters handed out
    pub fn expected(&self) -> usize {
        self.issued
    }

    /// Waits until every reporter has reported or been dropped
    ///
    /// Returns all outcomes in the order they arrived.
    pub async fn collect(self) -> Vec<TaskOutcome> {
        let Self {
            sender,
            mut receiver,
            issued,
        } = self;
        drop(sender);

        let mut outcomes = Vec::with_capacity(issued);
        while let Some(outcome) = receiver.recv().await {
            outcomes.push(outcome);
        }

        debug!("Collected {} of {} outcome(s)", outcomes.len(), issued);
        outcomes
    }
}

impl Default for OutcomeAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// One task's handle for posting its terminal outcome
#[derive(Debug)]
pub struct OutcomeReporter {
    task: TaskId,
    sender: Option<mpsc::UnboundedSender<TaskOutcome>>,
}

impl OutcomeReporter {
    pub fn task(&self) -> &TaskId {
        &self.task
    }

    /// Reports success with the number of bytes handled
    pub fn succeed(self, bytes: u64, warnings: Vec<String>) {
        let outcome = TaskOutcome::succeeded(self.task.clone(), bytes).with_warnings(warnings);
        self.post(outcome);
    }

    /// Reports failure; `bytes` is what got through before the failure
    pub fn fail(self, error: TaskError, bytes: u64) {
        let outcome = TaskOutcome::failed(self.task.clone(), error).with_bytes(bytes);
        self.post(outcome);
    }

    fn post(mut self, outcome: TaskOutcome) {
        if let Some(sender) = self.sender.take() {
            // The aggregator outlives every reporter it issued
            let _ = sender.send(outcome);
        }
    }
}

impl Drop for OutcomeReporter {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            warn!("{} ended without reporting an outcome", self.task);
            let _ = sender.send(TaskOutcome::failed(
                self.task.clone(),
                TaskError::Abandoned,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collects_every_outcome() {
        let mut aggregator = OutcomeAggregator::new();
        let producer = aggregator.reporter(TaskId::Producer);
        let first = aggregator.reporter(TaskId::consumer(0, "a"));
        let second = aggregator.reporter(TaskId::consumer(1, "b"));
        assert_eq!(aggregator.expected(), 3);

        let handles = vec![
            tokio::spawn(async move { producer.succeed(13, vec![]) }),
            tokio::spawn(async move {
                first.fail(
                    TaskError::ConsumerRuntime {
                        leg: 0,
                        destination: "a".to_string(),
                        reason: "exit code 1".to_string(),
                    },
                    4,
                )
            }),
            tokio::spawn(async move { second.fail(TaskError::Abandoned, 0) }),
        ];
        for handle in handles {
            handle.await.unwrap();
        }

        let outcomes = aggregator.collect().await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| !o.is_success()).count(), 2);

        let failed_a = outcomes
            .iter()
            .find(|o| o.task == TaskId::consumer(0, "a"))
            .unwrap();
        assert_eq!(failed_a.bytes, 4);
    }

    #[tokio::test]
    async fn test_dropped_reporter_counts_as_abandoned() {
        let mut aggregator = OutcomeAggregator::new();
        let reporter = aggregator.reporter(TaskId::Producer);

        let handle = tokio::spawn(async move {
            let _reporter = reporter;
            panic!("task blew up");
        });
        assert!(handle.await.is_err());

        let outcomes = aggregator.collect().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].error(), Some(&TaskError::Abandoned));
    }

    #[tokio::test]
    async fn test_collect_with_no_tasks() {
        let aggregator = OutcomeAggregator::default();
        assert!(aggregator.collect().await.is_empty());
    }

    #[tokio::test]
    async fn test_collect_waits_for_slow_reporters() {
        let mut aggregator = OutcomeAggregator::new();
        let reporter = aggregator.reporter(TaskId::consumer(0, "slow"));

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            reporter.succeed(1, vec!["close failed".to_string()]);
        });

        let outcomes = aggregator.collect().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].warnings, vec!["close failed"]);
    }
}
