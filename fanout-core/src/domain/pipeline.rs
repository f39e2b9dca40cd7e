//! Pipeline domain types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use super::process::ProcessSpec;
use crate::error::DefinitionError;

/// Pipeline definition
///
/// Describes one run: the producer, the fixed ordered set of consumers and
/// the deadline. Usually loaded from a JSON file by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default = "default_name")]
    pub name: String,
    pub producer: ProcessSpec,
    pub consumers: Vec<ConsumerSpec>,
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// Backing resource that must exist before the producer starts
    #[serde(default)]
    pub provision: Option<ProvisionSpec>,
}

fn default_name() -> String {
    "pipeline".to_string()
}

impl PipelineDefinition {
    pub fn new(producer: ProcessSpec, consumers: Vec<ConsumerSpec>) -> Self {
        Self {
            name: default_name(),
            producer,
            consumers,
            deadline_secs: None,
            provision: None,
        }
    }

    /// Parses and validates a JSON pipeline definition
    pub fn from_json(source: &str) -> Result<Self, DefinitionError> {
        let definition: Self =
            serde_json::from_str(source).map_err(|e| DefinitionError::Parse(e.to_string()))?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Validates the definition
    ///
    /// A run needs a producer command, at least one consumer and unique,
    /// non-empty consumer destinations.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.producer.validate()?;

        if self.consumers.is_empty() {
            return Err(DefinitionError::NoConsumers);
        }

        let mut seen = HashSet::new();
        for (leg, consumer) in self.consumers.iter().enumerate() {
            if consumer.destination.trim().is_empty() {
                return Err(DefinitionError::EmptyDestination(leg));
            }
            if !seen.insert(consumer.destination.as_str()) {
                return Err(DefinitionError::DuplicateDestination(
                    consumer.destination.clone(),
                ));
            }
            if let ConsumerTarget::Process { process, .. } = &consumer.target {
                process.validate()?;
            }
        }

        if self.deadline_secs == Some(0) {
            return Err(DefinitionError::ZeroDeadline);
        }

        if let Some(provision) = &self.provision {
            provision.validate()?;
        }

        Ok(())
    }
}

/// One consumer of the duplicated stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSpec {
    /// Identifier used in logs and byte-count reports
    pub destination: String,
    pub target: ConsumerTarget,
}

impl ConsumerSpec {
    /// Consumer that writes its leg straight into a file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            destination: path.display().to_string(),
            target: ConsumerTarget::File { path },
        }
    }

    /// Consumer that feeds its leg into an external process's stdin
    pub fn process(destination: impl Into<String>, process: ProcessSpec) -> Self {
        Self {
            destination: destination.into(),
            target: ConsumerTarget::Process {
                process,
                output: None,
            },
        }
    }

    /// Redirects a process consumer's stdout into a file
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        if let ConsumerTarget::Process { output, .. } = &mut self.target {
            *output = Some(path.into());
        }
        self
    }
}

/// Where a consumer sends the bytes of its leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsumerTarget {
    Process {
        process: ProcessSpec,
        /// File receiving the process's stdout; forwarded when unset
        #[serde(default)]
        output: Option<PathBuf>,
    },
    File {
        path: PathBuf,
    },
}

/// Container that must be running before the pipeline starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSpec {
    /// Container engine binary (docker or podman)
    #[serde(default = "default_engine")]
    pub engine: String,
    pub container: String,
    pub image: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Port mappings, e.g. "3306:3306"
    #[serde(default)]
    pub ports: Vec<String>,
}

fn default_engine() -> String {
    "docker".to_string()
}

impl ProvisionSpec {
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.engine.trim().is_empty() {
            return Err(DefinitionError::InvalidProvision(
                "engine cannot be empty".to_string(),
            ));
        }
        if self.container.trim().is_empty() {
            return Err(DefinitionError::InvalidProvision(
                "container name cannot be empty".to_string(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(DefinitionError::InvalidProvision(
                "image cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
