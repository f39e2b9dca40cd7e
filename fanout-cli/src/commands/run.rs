//! Run command handler
//!
//! Builds a pipeline from flags or a definition file, provisions what it
//! needs, runs it and reports the result.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use fanout_core::domain::outcome::{TaskId, TaskOutcome};
use fanout_core::domain::pipeline::{ConsumerSpec, PipelineDefinition};
use fanout_core::domain::process::ProcessSpec;
use fanout_runner::{Config, ContainerProvisioner, Coordinator, ProvisionStatus, Provisioner, RunReport};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use super::load_definition;

/// Arguments of `fanout run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON pipeline definition (replaces --producer/--consumer/--to-file)
    #[arg(long, conflicts_with_all = ["producer", "consumer", "to_file"])]
    pub pipeline: Option<PathBuf>,

    /// Producer command line, e.g. "mysqldump --all-databases"
    #[arg(long, required_unless_present = "pipeline")]
    pub producer: Option<String>,

    /// Consumer command line fed through stdin (repeatable)
    #[arg(long)]
    pub consumer: Vec<String>,

    /// File that receives a copy of the stream (repeatable)
    #[arg(long, value_name = "PATH")]
    pub to_file: Vec<PathBuf>,

    /// Deadline for the whole run in seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Largest chunk read from the producer in bytes
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Do not provision containers listed in the pipeline file
    #[arg(long)]
    pub skip_provision: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Handle `fanout run`
pub async fn handle_run_command(args: RunArgs) -> Result<()> {
    let definition = build_definition(&args)?;
    definition
        .validate()
        .context("Invalid pipeline definition")?;

    let config = build_config(&args, &definition, Config::from_env()?)?;

    if let Some(spec) = definition.provision.clone() {
        if args.skip_provision {
            warn!("Skipping provisioning of container {}", spec.container);
        } else {
            let status = tokio::task::spawn_blocking(move || ContainerProvisioner::new(spec).ensure())
                .await
                .context("Provisioning task panicked")??;
            if status == ProvisionStatus::Created {
                info!("Provisioned container for pipeline '{}'", definition.name);
            }
        }
    }

    let coordinator = Coordinator::from_definition(&definition, config)?;
    let report = coordinator.run().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    finish(&report, args.json)
}

/// Builds the definition from a file or from command-line flags
fn build_definition(args: &RunArgs) -> Result<PipelineDefinition> {
    if let Some(path) = &args.pipeline {
        return load_definition(path);
    }

    let producer = args
        .producer
        .as_deref()
        .context("--producer is required without --pipeline")?;
    let producer = ProcessSpec::parse(producer).context("Invalid --producer")?;

    let mut consumers = Vec::with_capacity(args.consumer.len() + args.to_file.len());
    for (command_line, destination) in args.consumer.iter().zip(consumer_destinations(&args.consumer)) {
        let spec = ProcessSpec::parse(command_line)
            .with_context(|| format!("Invalid --consumer '{}'", command_line))?;
        consumers.push(ConsumerSpec::process(destination, spec));
    }
    consumers.extend(args.to_file.iter().map(ConsumerSpec::file));

    if consumers.is_empty() {
        anyhow::bail!("At least one --consumer or --to-file is required");
    }

    Ok(PipelineDefinition::new(producer, consumers))
}

/// Names each `--consumer` after its command line
///
/// Repeated command lines are numbered (`sed s/e/i/g #1`, `sed s/e/i/g #2`)
/// so identical consumers still get distinct destinations.
fn consumer_destinations(command_lines: &[String]) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for command_line in command_lines {
        *totals.entry(command_line.trim()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    command_lines
        .iter()
        .map(|command_line| {
            let command_line = command_line.trim();
            if totals[command_line] == 1 {
                return command_line.to_string();
            }
            let occurrence = seen.entry(command_line).or_default();
            *occurrence += 1;
            format!("{} #{}", command_line, occurrence)
        })
        .collect()
}

/// Deadline precedence: --deadline, then the definition, then the environment
fn build_config(args: &RunArgs, definition: &PipelineDefinition, base: Config) -> Result<Config> {
    let mut config = base;

    if let Some(deadline) = definition.deadline() {
        config = config.with_deadline(deadline);
    }
    if let Some(secs) = args.deadline {
        config = config.with_deadline(Duration::from_secs(secs));
    }
    if let Some(chunk_size) = args.chunk_size {
        config = config.with_chunk_size(chunk_size);
    }

    config.validate().context("Invalid run configuration")?;
    Ok(config)
}

fn finish(report: &RunReport, quiet: bool) -> Result<()> {
    if report.is_success() {
        if !quiet {
            for outcome in report.consumers() {
                if let Some(destination) = destination(outcome) {
                    println!("data count for {}: {} bytes", destination, outcome.bytes);
                }
            }
            for warning in report.warnings() {
                println!("{} {}", "warning:".yellow(), warning);
            }
            println!("--end--");
        }
        return Ok(());
    }

    for failure in report.failures() {
        if let Some(cause) = failure.error() {
            error!("{} failed: {}", failure.task, cause);
        }
    }

    let primary = report
        .first_failure()
        .and_then(|first| first.error().map(|cause| (first, cause)));
    match primary {
        Some((first, cause)) => anyhow::bail!("{} failed: {}", first.task, cause),
        None => anyhow::bail!("Pipeline '{}' finished without any outcome", report.name),
    }
}

fn destination(outcome: &TaskOutcome) -> Option<&str> {
    match &outcome.task {
        TaskId::Consumer { destination, .. } => Some(destination),
        TaskId::Producer => None,
    }
}
