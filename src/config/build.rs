//! Validated build settings
//!
//! Command-line and environment values win over the configuration file.
//! Everything that can be rejected is rejected here, before any
//! subprocess runs.

use crate::build::source::SourceRetention;
use crate::cargo::args::{tokenize, InstallArgs};
use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides {
    pub install_args: Option<String>,
    pub workspace_members: Option<String>,
    pub cargo_home: Option<PathBuf>,

    /// `:`-separated glob patterns
    pub include_files: Option<String>,
    pub exclude_files: Option<String>,

    /// Shell-quoted tool names
    pub install_tools: Option<String>,
    pub install_tools_args: Option<String>,

    pub tini: Option<bool>,
    pub disable_sbom: Option<bool>,
    pub stack: Option<String>,
    pub metadata: Vec<(String, String)>,
}

/// Everything one build needs, resolved once
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub app_dir: PathBuf,
    pub layers_dir: PathBuf,
    pub cargo_home: PathBuf,
    pub install_args: InstallArgs,
    pub workspace_members: String,
    pub install_tools: Vec<String>,
    pub install_tools_args: Vec<String>,
    pub retention: SourceRetention,
    pub tini: bool,
    pub disable_sbom: bool,
    pub stack: String,
    pub metadata: BTreeMap<String, String>,
}

impl BuildConfig {
    pub fn resolve(
        app_dir: &Path,
        layers_dir: &Path,
        file: &Config,
        overrides: &BuildOverrides,
    ) -> KilnResult<Self> {
        let app_dir = canonical_dir(app_dir)?;

        std::fs::create_dir_all(layers_dir)
            .map_err(|e| KilnError::io(format!("creating {}", layers_dir.display()), e))?;
        let layers_dir = canonical_dir(layers_dir)?;

        let configured_home = overrides
            .cargo_home
            .clone()
            .or_else(|| file.cargo.cargo_home.clone());
        let cargo_home = match configured_home {
            Some(path) => path,
            None => dirs::home_dir()
                .map(|home| home.join(".cargo"))
                .ok_or_else(|| KilnError::ConfigValue {
                    key: "cargo_home".to_string(),
                    reason: "unable to locate cargo home, set CARGO_HOME".to_string(),
                })?,
        };
        if !cargo_home.is_absolute() {
            return Err(KilnError::ConfigValue {
                key: "cargo_home".to_string(),
                reason: format!("{} is not an absolute path", cargo_home.display()),
            });
        }

        let install_args =
            InstallArgs::parse(pick(&overrides.install_args, &file.cargo.install_args))?;

        let install_tools = match &overrides.install_tools {
            Some(raw) => tokenize(raw)?,
            None => file.cargo.install_tools.clone(),
        };
        let install_tools_args = tokenize(pick(
            &overrides.install_tools_args,
            &file.cargo.install_tools_args,
        ))?;

        let include = match &overrides.include_files {
            Some(list) => SourceRetention::split_list(list),
            None => file.source.include_files.clone(),
        };
        let exclude = match &overrides.exclude_files {
            Some(list) => SourceRetention::split_list(list),
            None => file.source.exclude_files.clone(),
        };
        let retention = SourceRetention::new(include.as_slice(), exclude.as_slice())?;

        let mut metadata = file.metadata.clone();
        for (key, value) in &overrides.metadata {
            metadata.insert(key.clone(), value.clone());
        }

        Ok(Self {
            app_dir,
            layers_dir,
            cargo_home,
            install_args,
            workspace_members: pick(
                &overrides.workspace_members,
                &file.cargo.workspace_members,
            )
            .to_string(),
            install_tools,
            install_tools_args,
            retention,
            tini: overrides.tini.unwrap_or(file.launch.tini),
            disable_sbom: overrides.disable_sbom.unwrap_or(file.launch.disable_sbom),
            stack: overrides.stack.clone().unwrap_or_default(),
            metadata,
        })
    }
}

fn pick<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().unwrap_or(fallback)
}

fn canonical_dir(path: &Path) -> KilnResult<PathBuf> {
    let canonical = path
        .canonicalize()
        .map_err(|_| KilnError::PathNotFound(path.to_path_buf()))?;
    if canonical.is_dir() {
        Ok(canonical)
    } else {
        Err(KilnError::ConfigValue {
            key: "directory".to_string(),
            reason: format!("{} is not a directory", path.display()),
        })
    }
}

/// Parse a `KEY=VALUE` pair
pub fn parse_key_value(pair: &str) -> Result<(String, String), String> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {:?}", pair)),
    }
}
