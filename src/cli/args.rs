//! CLI argument definitions using clap derive

use crate::config::build::parse_key_value;
use crate::config::BuildOverrides;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Kiln - incremental Cargo builds for container images
///
/// Builds every binary of a Cargo workspace into a cached layer and
/// leaves only the binaries behind.
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path (defaults to <APP_DIR>/kiln.toml)
    #[arg(short, long, global = true, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether a directory is a Cargo project
    Detect(DetectArgs),

    /// Build the application and remove its sources
    Build(BuildArgs),
}

/// Arguments for the detect command
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Application directory
    #[arg(default_value = ".")]
    pub app_dir: PathBuf,

    /// Write the build plan of a passing project to this file
    #[arg(long)]
    pub plan: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Application directory
    #[arg(default_value = ".")]
    pub app_dir: PathBuf,

    /// Directory holding the layers
    #[arg(short, long, env = "CNB_LAYERS_DIR")]
    pub layers: PathBuf,

    /// Extra `cargo install` arguments
    #[arg(long, env = "BP_CARGO_INSTALL_ARGS", allow_hyphen_values = true)]
    pub install_args: Option<String>,

    /// Comma-separated workspace members to build
    #[arg(long, env = "BP_CARGO_WORKSPACE_MEMBERS")]
    pub workspace_members: Option<String>,

    /// Cargo download cache
    #[arg(long, env = "CARGO_HOME")]
    pub cargo_home: Option<PathBuf>,

    /// Colon-separated patterns of files kept after the build
    #[arg(long, env = "BP_INCLUDE_FILES")]
    pub include_files: Option<String>,

    /// Colon-separated patterns of files removed even when included
    #[arg(long, env = "BP_EXCLUDE_FILES")]
    pub exclude_files: Option<String>,

    /// Additional crates to `cargo install` before the build
    #[arg(long, env = "BP_CARGO_INSTALL_TOOLS")]
    pub install_tools: Option<String>,

    /// Arguments for every tool install
    #[arg(long, env = "BP_CARGO_INSTALL_TOOLS_ARGS", allow_hyphen_values = true)]
    pub install_tools_args: Option<String>,

    /// Run processes under tini
    #[arg(
        long,
        env = "BP_CARGO_TINI",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub tini: Option<bool>,

    /// Skip the SBOM scan of the application layer
    #[arg(
        long,
        env = "BP_DISABLE_SBOM",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub disable_sbom: Option<bool>,

    /// Stack id of the run image
    #[arg(long, env = "CNB_STACK_ID")]
    pub stack: Option<String>,

    /// Extra fingerprint entry (repeatable)
    #[arg(long = "metadata", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,
}

impl BuildArgs {
    pub fn overrides(&self) -> BuildOverrides {
        BuildOverrides {
            install_args: self.install_args.clone(),
            workspace_members: self.workspace_members.clone(),
            cargo_home: self.cargo_home.clone(),
            include_files: self.include_files.clone(),
            exclude_files: self.exclude_files.clone(),
            install_tools: self.install_tools.clone(),
            install_tools_args: self.install_tools_args.clone(),
            tini: self.tini,
            disable_sbom: self.disable_sbom,
            stack: self.stack.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
