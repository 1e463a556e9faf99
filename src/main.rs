//! Binary entry point for the `RunPod` CLI.
//!
//! Parses arguments, wires up logging, runs exactly one command, prints its
//! rendered output, and exits nonzero on any failure.

#![allow(clippy::print_stdout)] // The binary owns stdout; tables land there.

use clap::Parser;
use runpod_cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for tables.
    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.run().await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
