//! Legal Markdown CLI.
//!
//! Provides commands for:
//! - `process`: Render a legal markdown document to HTML or markdown
//! - `plugins`: List the built-in processing stages in execution order
//! - `check-order`: Validate a custom stage order

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckOrderArgs, PluginsArgs, ProcessArgs};
use output::Output;

/// Legal Markdown processor.
#[derive(Parser)]
#[command(name = "lmd", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a legal markdown document.
    Process(ProcessArgs),
    /// List built-in processing stages.
    Plugins(PluginsArgs),
    /// Validate a processing stage order.
    CheckOrder(CheckOrderArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Process(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Process(args) => args.execute(&output),
        Commands::Plugins(args) => args.execute(&output),
        Commands::CheckOrder(args) => args.execute(&output),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
