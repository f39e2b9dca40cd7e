//! Pipeline coordinator
//!
//! Owns one run: builds the legs, starts the producer task and one consumer
//! task per leg, bounds all of them by a single deadline and turns their
//! outcomes into a [`RunReport`].
//!
//! The producer task is the only place legs are closed. It closes them after
//! the producer finishes for any reason (success, error, deadline), so
//! consumers always reach end-of-stream.

use fanout_core::domain::outcome::TaskId;
use fanout_core::domain::pipeline::{ConsumerTarget, PipelineDefinition};
use fanout_core::error::{DefinitionError, TaskError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::{OutcomeAggregator, OutcomeReporter};
use crate::config::Config;
use crate::duplicator::Duplicator;
use crate::leg::LegReader;
use crate::report::RunReport;
use crate::task::{CommandConsumer, CommandProducer, Consumer, FileConsumer, Producer};

/// Runs one producer against a fixed set of consumers
pub struct Coordinator {
    name: String,
    config: Config,
    producer: Arc<dyn Producer>,
    consumers: Vec<Arc<dyn Consumer>>,
}

impl Coordinator {
    /// Creates a coordinator
    ///
    /// # Arguments
    /// * `config` - Deadline and streaming tunables
    /// * `producer` - Source of the stream
    /// * `consumers` - One consumer per leg, at least one
    pub fn new(
        config: Config,
        producer: Arc<dyn Producer>,
        consumers: Vec<Arc<dyn Consumer>>,
    ) -> Result<Self, DefinitionError> {
        if consumers.is_empty() {
            return Err(DefinitionError::NoConsumers);
        }

        Ok(Self {
            name: "pipeline".to_string(),
            config,
            producer,
            consumers,
        })
    }

    /// Builds command and file backed tasks from a pipeline definition
    pub fn from_definition(
        definition: &PipelineDefinition,
        config: Config,
    ) -> Result<Self, DefinitionError> {
        definition.validate()?;

        let producer: Arc<dyn Producer> = Arc::new(CommandProducer::new(
            definition.producer.clone(),
            config.chunk_size,
        ));

        let consumers = definition
            .consumers
            .iter()
            .map(|consumer| -> Arc<dyn Consumer> {
                match &consumer.target {
                    ConsumerTarget::Process { process, output } => Arc::new(CommandConsumer::new(
                        consumer.destination.clone(),
                        process.clone(),
                        output.clone(),
                    )),
                    ConsumerTarget::File { path } => {
                        Arc::new(FileConsumer::new(consumer.destination.clone(), path.clone()))
                    }
                }
            })
            .collect();

        Ok(Self::new(config, producer, consumers)?.with_name(definition.name.clone()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Runs the pipeline with the configured deadline
    ///
    /// Every task is bounded by one deadline, `config.deadline` from now.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let budget = self.config.deadline;
        let deadline = Instant::now() + budget;

        info!(
            "Starting pipeline '{}' (run {}): producer '{}', {} consumer(s), deadline {:?}",
            self.name,
            run_id,
            self.producer.describe(),
            self.consumers.len(),
            budget
        );

        let (duplicator, readers) =
            Duplicator::with_legs(self.consumers.len(), self.config.leg_capacity);
        let mut aggregator = OutcomeAggregator::new();
        let mut handles = Vec::with_capacity(self.consumers.len() + 1);

        let reporter = aggregator.reporter(TaskId::Producer);
        handles.push(tokio::spawn(run_producer(
            Arc::clone(&self.producer),
            duplicator,
            deadline,
            budget,
            reporter,
        )));

        for (leg, (consumer, reader)) in self.consumers.iter().zip(readers).enumerate() {
            let reporter = aggregator.reporter(TaskId::consumer(leg, consumer.destination()));
            handles.push(tokio::spawn(run_consumer(
                Arc::clone(consumer),
                leg,
                reader,
                deadline,
                budget,
                reporter,
            )));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Pipeline task panicked: {}", e);
            }
        }

        let outcomes = aggregator.collect().await;
        let report = RunReport {
            run_id,
            name: self.name.clone(),
            started_at,
            finished_at: chrono::Utc::now(),
            outcomes,
        };

        if report.is_success() {
            info!(
                "Pipeline '{}' (run {}) succeeded in {}ms",
                self.name,
                run_id,
                report.elapsed().num_milliseconds()
            );
        } else {
            for failure in report.failures() {
                if let Some(error) = failure.error() {
                    error!("{} failed: {}", failure.task, error);
                }
            }
        }

        report
    }
}

fn deadline_error(budget: Duration) -> TaskError {
    TaskError::DeadlineExceeded {
        deadline_ms: budget.as_millis() as u64,
    }
}

/// Producer task: produce, then close every leg no matter what
async fn run_producer(
    producer: Arc<dyn Producer>,
    mut duplicator: Duplicator,
    deadline: Instant,
    budget: Duration,
    reporter: OutcomeReporter,
) {
    let result = tokio::select! {
        produced = producer.produce(&mut duplicator) => produced,
        _ = time::sleep_until(deadline) => {
            warn!("Deadline reached, stopping producer '{}'", producer.describe());
            Err(deadline_error(budget))
        }
    };

    let closed = duplicator.close();
    debug!("Producer task closed {} leg(s)", closed);

    match result {
        Ok(bytes) => {
            info!("Producer wrote {} bytes", bytes);
            reporter.succeed(bytes, Vec::new());
        }
        Err(error) => reporter.fail(error, duplicator.bytes_written()),
    }
}

/// Consumer task: drain one leg into its destination
async fn run_consumer(
    consumer: Arc<dyn Consumer>,
    leg: usize,
    reader: LegReader,
    deadline: Instant,
    budget: Duration,
    reporter: OutcomeReporter,
) {
    let delivered = reader.delivered();
    let result = tokio::select! {
        consumed = consumer.consume(leg, reader) => consumed,
        _ = time::sleep_until(deadline) => {
            warn!("Deadline reached, stopping consumer for {}", consumer.destination());
            Err(deadline_error(budget))
        }
    };

    match result {
        Ok(mut report) => {
            if report.bytes == 0 {
                let warning = format!("No data written to {}", consumer.destination());
                warn!("{}", warning);
                report.warnings.push(warning);
            }
            info!("Data count for {}: {} bytes", consumer.destination(), report.bytes);
            reporter.succeed(report.bytes, report.warnings);
        }
        Err(error) => reporter.fail(error, delivered.get()),
    }
}
