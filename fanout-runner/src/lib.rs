//! Fanout Runner
//!
//! Streams the output of one producer process to several consumers at once.
//!
//! Architecture:
//! - Legs: bounded per-consumer channels carrying shared byte chunks
//! - Duplicator: writes every chunk to every leg, in lockstep
//! - Tasks: the producer and consumers, backed by external processes or files
//! - Aggregator: collects one outcome per task
//! - Coordinator: starts the tasks, enforces the deadline, builds the report
//! - Provisioning: prepares the containers a producer depends on
//!
//! Nothing here exits the process; callers decide what a failed
//! [`RunReport`] means for them.

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod duplicator;
pub mod leg;
pub mod process;
pub mod provision;
pub mod report;
pub mod task;

pub use aggregator::{OutcomeAggregator, OutcomeReporter};
pub use config::Config;
pub use coordinator::Coordinator;
pub use duplicator::{Duplicator, DuplicatorError};
pub use leg::{LegError, LegReader, LegWriter};
pub use provision::{ContainerProvisioner, ProvisionStatus, Provisioner};
pub use report::RunReport;
pub use task::{CommandConsumer, CommandProducer, ConsumeReport, Consumer, FileConsumer, Producer};
