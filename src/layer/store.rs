//! Layer allocation and metadata

use crate::error::{KilnError, KilnResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifact cache, linked as `<app>/target`
pub const CACHE_LAYER: &str = "cargo-cache";

/// Installed application binaries
pub const APPLICATION_LAYER: &str = "rust-application";

/// When a layer is made available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTypes {
    pub build: bool,
    pub cache: bool,
    pub launch: bool,
}

impl LayerTypes {
    pub fn cache() -> Self {
        Self {
            cache: true,
            ..Self::default()
        }
    }

    pub fn cache_and_launch() -> Self {
        Self {
            cache: true,
            launch: true,
            ..Self::default()
        }
    }
}

/// On-disk shape of `<layers>/<name>.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LayerFile {
    types: LayerTypes,
    metadata: BTreeMap<String, toml::Value>,
}

/// One persistent directory and its description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub path: PathBuf,
    pub types: LayerTypes,

    /// Metadata recorded by the previous build, or set for the next write
    pub metadata: BTreeMap<String, String>,

    descriptor: PathBuf,
}

impl Layer {
    /// Whether the recorded metadata is exactly `expected`
    pub fn metadata_matches(&self, expected: &BTreeMap<String, String>) -> bool {
        !self.metadata.is_empty() && &self.metadata == expected
    }

    /// Empty the layer directory and forget its metadata
    pub fn reset(&mut self) -> KilnResult<()> {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                return Err(layer_io(&self.name, "resetting", &self.path, e));
            }
        }
        fs::create_dir_all(&self.path)
            .map_err(|e| layer_io(&self.name, "creating", &self.path, e))?;
        self.metadata.clear();
        debug!("Reset layer {}", self.name);
        Ok(())
    }

    /// Append `value` to the launch-time variable `name`, joined by `delim`
    pub fn append_launch_env(
        &self,
        name: &str,
        value: impl AsRef<Path>,
        delim: &str,
    ) -> KilnResult<()> {
        let env_dir = self.path.join("env.launch");
        fs::create_dir_all(&env_dir).map_err(|e| layer_io(&self.name, "creating", &env_dir, e))?;

        let append = env_dir.join(format!("{}.append", name));
        fs::write(&append, value.as_ref().display().to_string())
            .map_err(|e| layer_io(&self.name, "writing", &append, e))?;

        let delim_file = env_dir.join(format!("{}.delim", name));
        fs::write(&delim_file, delim).map_err(|e| layer_io(&self.name, "writing", &delim_file, e))
    }

    /// Persist types and metadata to `<layers>/<name>.toml`
    pub fn write(&self) -> KilnResult<()> {
        let file = LayerFile {
            types: self.types,
            metadata: self
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
                .collect(),
        };
        let content = toml::to_string(&file)?;
        fs::write(&self.descriptor, content)
            .map_err(|e| layer_io(&self.name, "writing", &self.descriptor, e))
    }
}

/// Allocates layers under one directory
#[derive(Debug, Clone)]
pub struct LayerStore {
    root: PathBuf,
}

impl LayerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (creating if needed) the layer called `name`.
    ///
    /// `types` replaces whatever types were recorded before; the recorded
    /// metadata is loaded for comparison.
    pub fn layer(&self, name: &str, types: LayerTypes) -> KilnResult<Layer> {
        validate_name(name)?;

        let path = self.root.join(name);
        fs::create_dir_all(&path).map_err(|e| layer_io(name, "creating", &path, e))?;

        let descriptor = self.root.join(format!("{}.toml", name));
        let recorded = match fs::read_to_string(&descriptor) {
            Ok(content) => toml::from_str::<LayerFile>(&content).map_err(|e| KilnError::Layer {
                name: name.to_string(),
                reason: format!("invalid {}: {}", descriptor.display(), e),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => LayerFile::default(),
            Err(e) => return Err(layer_io(name, "reading", &descriptor, e)),
        };

        let metadata = recorded
            .metadata
            .into_iter()
            .map(|(k, v)| match v {
                toml::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();

        Ok(Layer {
            name: name.to_string(),
            path,
            types,
            metadata,
            descriptor,
        })
    }
}

/// Names whose `.toml` collides with the lifecycle's own files
const RESERVED_NAMES: [&str; 3] = ["build", "launch", "store"];

fn validate_name(name: &str) -> KilnResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !RESERVED_NAMES.contains(&name);

    if valid {
        Ok(())
    } else {
        Err(KilnError::Layer {
            name: name.to_string(),
            reason: "layer names must be a single path component and not reserved".to_string(),
        })
    }
}

fn layer_io(name: &str, action: &str, path: &Path, source: std::io::Error) -> KilnError {
    KilnError::io(format!("{} layer {} at {}", action, name, path.display()), source)
}
