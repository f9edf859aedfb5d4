//! Configuration schema for kiln
//!
//! Configuration is read from `<app>/kiln.toml` unless `--config` names
//! another file. Every section is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cargo invocation settings
    pub cargo: CargoConfig,

    /// Source retention after the build
    pub source: SourceConfig,

    /// Launch image settings
    pub launch: LaunchConfig,

    /// Extra fingerprint pairs
    pub metadata: BTreeMap<String, String>,
}

/// Cargo invocation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CargoConfig {
    /// Extra `cargo install` arguments, shell quoted
    pub install_args: String,

    /// Comma-separated workspace members to build
    pub workspace_members: String,

    /// Download cache location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo_home: Option<PathBuf>,

    /// Crates installed with `cargo install` before the application
    pub install_tools: Vec<String>,

    /// Arguments passed to every tool install, shell quoted
    pub install_tools_args: String,
}

/// Which application files survive source removal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Glob patterns of top-level entries to keep
    pub include_files: Vec<String>,

    /// Glob patterns removed even when included
    pub exclude_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Start processes under `tini`
    pub tini: bool,

    /// Skip the SBOM scan of the application layer
    pub disable_sbom: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[cargo]"));
        assert!(toml.contains("[launch]"));
        assert!(!toml.contains("cargo_home"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [cargo]
            install_args = "--locked"
            install_tools = ["diesel_cli"]

            [source]
            include_files = ["static", "templates"]

            [metadata]
            region = "eu"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cargo.install_args, "--locked");
        assert_eq!(config.cargo.install_tools, vec!["diesel_cli"]);
        assert_eq!(config.source.include_files, vec!["static", "templates"]);
        assert_eq!(config.metadata["region"], "eu");
        assert!(!config.launch.tini); // default preserved
    }
}
