//! `launch.toml` process types

use crate::error::{KilnError, KilnResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the process list inside the layers directory
pub const LAUNCH_FILE: &str = "launch.toml";

/// One way of starting the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    #[serde(rename = "type")]
    pub kind: String,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Executed without a shell
    #[serde(default)]
    pub direct: bool,

    #[serde(default)]
    pub default: bool,
}

/// Image label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LaunchFile {
    #[serde(default)]
    pub processes: Vec<Process>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

impl LaunchFile {
    pub fn new(processes: Vec<Process>, labels: Vec<Label>) -> Self {
        Self { processes, labels }
    }

    pub fn write(&self, layers_dir: &Path) -> KilnResult<()> {
        let path = layers_dir.join(LAUNCH_FILE);
        let content = toml::to_string(self)?;
        fs::write(&path, content)
            .map_err(|e| KilnError::io(format!("writing {}", path.display()), e))
    }

    pub fn read(layers_dir: &Path) -> KilnResult<Self> {
        let path = layers_dir.join(LAUNCH_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
        Ok(toml::from_str(&content)?)
    }
}
