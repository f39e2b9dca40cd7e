//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod check;
mod run;

pub use run::RunArgs;

use anyhow::{Context, Result};
use clap::Subcommand;
use fanout_core::domain::pipeline::PipelineDefinition;
use std::path::{Path, PathBuf};

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline
    Run(RunArgs),
    /// Validate a pipeline definition file
    Check {
        /// Path to a JSON pipeline definition
        file: PathBuf,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run::handle_run_command(args).await,
        Commands::Check { file } => check::handle_check_command(&file),
    }
}

/// Reads a pipeline definition from a JSON file
fn load_definition(path: &Path) -> Result<PipelineDefinition> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

    PipelineDefinition::from_json(&source)
        .with_context(|| format!("Failed to parse pipeline file: {}", path.display()))
}
