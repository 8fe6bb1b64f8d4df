//! Main entry point for snapsweep CLI

use clap::Parser;
use snapsweep::cli::Cli;
use snapsweep::commands::{execute_command, GlobalOptions, RunStatus};

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG still overrides the default level
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let options = match GlobalOptions::from_cli(&cli) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Execute the command
    match execute_command(cli.command, &options) {
        Ok(RunStatus::Clean) => {}
        Ok(RunStatus::PartialFailure) => {
            eprintln!("Some snapshots could not be processed; see the log for details");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
