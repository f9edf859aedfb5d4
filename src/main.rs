//! Kiln - incremental Cargo builds for container images
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use kiln::cli::{Cli, Commands};
use kiln::config::ConfigManager;
use kiln::error::KilnResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KilnResult<ExitCode> {
    let cli = Cli::parse();

    // 0 = info (build output), 1 = debug, 2+ = trace; RUST_LOG wins
    let default_filter = match cli.verbose {
        0 => "kiln=info",
        1 => "kiln=debug",
        _ => "kiln=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Detect(args) => kiln::cli::commands::detect(args).await,
        Commands::Build(args) => {
            let config_manager = match &cli.config {
                Some(path) => ConfigManager::with_path(path.clone()),
                None => ConfigManager::for_app(&args.app_dir),
            };
            let config = config_manager.load().await?;
            kiln::cli::commands::build(args, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
