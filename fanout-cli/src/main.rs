//! Fanout CLI
//!
//! Command-line interface for streaming one producer into several consumers.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Stream one producer's output to many consumers", long_about = None)]
struct Cli {
    /// Tracing filter directives
    #[arg(
        long,
        global = true,
        env = "FANOUT_LOG",
        default_value = "fanout_cli=info,fanout_runner=info"
    )]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries consumer output and byte counts.
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    handle_command(cli.command).await
}
