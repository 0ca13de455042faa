//! Casepilot CLI - Main Entry Point
//!
//! Turns spreadsheets of manual test cases into canonical test cases and
//! drives the generation/execution engine over them.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{columns, extract, run};

/// Casepilot - spreadsheet test cases to self-healing automated runs
#[derive(Parser)]
#[command(name = "casepilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how spreadsheet headers map onto test case fields
    Columns(columns::ColumnsArgs),

    /// Extract test cases from a spreadsheet
    Extract(extract::ExtractArgs),

    /// Extract test cases and run them through the engine
    Run(run::RunArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Columns(args) => columns::execute(args, cli.format)?,
        Commands::Extract(args) => extract::execute(args, cli.format)?,
        Commands::Run(args) => run::execute(args, cli.format).await?,
        Commands::Version => {
            println!("Casepilot CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Common library v{}", casepilot_common::VERSION);
        }
    }

    Ok(())
}
