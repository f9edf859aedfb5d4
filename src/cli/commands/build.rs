//! Build command - build the application into its layers

use crate::build::Build;
use crate::cargo::TokioExecutor;
use crate::cli::args::BuildArgs;
use crate::config::{BuildConfig, Config};
use crate::error::KilnResult;
use crate::layer::LaunchFile;
use console::style;
use tracing::info;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> KilnResult<()> {
    let build_config =
        BuildConfig::resolve(&args.app_dir, &args.layers, config, &args.overrides())?;
    let executor = TokioExecutor::new();

    let result = Build::new(&build_config, &executor).run().await?;

    LaunchFile::new(result.processes.clone(), result.labels.clone())
        .write(&build_config.layers_dir)?;

    if result.processes.is_empty() {
        info!("No binary targets found, no process types contributed");
    }

    println!("{}", style("Process types:").bold());
    for process in &result.processes {
        let marker = if process.default { " (default)" } else { "" };
        let command = std::iter::once(process.command.as_str())
            .chain(process.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "  {}: {}{}",
            style(&process.kind).cyan(),
            command,
            style(marker).dim()
        );
    }

    Ok(())
}
