//! Check command handler
//!
//! Validates a pipeline definition file without running anything.

use anyhow::{Context, Result};
use colored::*;
use fanout_core::domain::pipeline::{ConsumerTarget, PipelineDefinition};
use std::path::Path;

use super::load_definition;

/// Handle `fanout check`
pub fn handle_check_command(path: &Path) -> Result<()> {
    let definition = load_definition(path)?;
    definition
        .validate()
        .with_context(|| format!("Invalid pipeline definition: {}", path.display()))?;

    print_summary(&definition);
    Ok(())
}

fn print_summary(definition: &PipelineDefinition) {
    println!("{}", "✓ Pipeline definition is valid".green().bold());
    println!("  Name:      {}", definition.name.bold());
    println!("  Producer:  {}", definition.producer.to_string().cyan());
    match definition.deadline() {
        Some(deadline) => println!("  Deadline:  {}s", deadline.as_secs()),
        None => println!("  Deadline:  {}", "default".dimmed()),
    }

    println!("  Consumers: {}", definition.consumers.len());
    for (leg, consumer) in definition.consumers.iter().enumerate() {
        let target = match &consumer.target {
            ConsumerTarget::Process { process, output } => match output {
                Some(output) => format!("{} > {}", process, output.display()),
                None => process.to_string(),
            },
            ConsumerTarget::File { path } => format!("file {}", path.display()),
        };
        println!(
            "    [{}] {} {}",
            leg,
            consumer.destination.cyan(),
            format!("({})", target).dimmed()
        );
    }

    if let Some(provision) = &definition.provision {
        println!(
            "  Provision: {} {} from {}",
            provision.engine,
            provision.container.cyan(),
            provision.image.dimmed()
        );
    }
}
