//! Detect command - check whether a directory is a Cargo project

use crate::cli::args::DetectArgs;
use crate::detect::detect_plan;
use crate::error::{KilnError, KilnResult};
use console::{style, Emoji};
use std::process::ExitCode;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[PASS] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");

/// Exit code of a project this tool does not apply to
pub const DETECT_FAIL_CODE: u8 = 100;

/// Execute the detect command
pub async fn execute(args: DetectArgs) -> KilnResult<ExitCode> {
    let Some(plan) = detect_plan(&args.app_dir)? else {
        println!(
            "{} {} needs Cargo.toml and Cargo.lock",
            CROSS,
            style(args.app_dir.display()).bold()
        );
        return Ok(ExitCode::from(DETECT_FAIL_CODE));
    };

    println!("{} {} is a Cargo project", CHECK, style(args.app_dir.display()).bold());

    if let Some(path) = &args.plan {
        let content = plan.to_toml()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| KilnError::io(format!("writing build plan {}", path.display()), e))?;
    }

    Ok(ExitCode::SUCCESS)
}
