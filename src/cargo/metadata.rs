//! `cargo metadata` project graph
//!
//! Only the fields kiln needs are decoded; everything else in the
//! `--format-version=1` document is ignored.

use crate::cargo::executor::{Execution, Executor};
use crate::error::{KilnError, KilnResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Arguments of the introspection call. `--no-deps` keeps it from resolving
/// the dependency graph.
pub const METADATA_ARGS: [&str; 3] = ["metadata", "--format-version=1", "--no-deps"];

/// A compilation unit within a package
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildTarget {
    /// Target kinds (`bin`, `lib`, `example`, ...)
    #[serde(default)]
    pub kind: Vec<String>,

    pub name: String,

    /// Absolute path of the target's root source file
    #[serde(default)]
    pub src_path: PathBuf,
}

impl BuildTarget {
    pub fn is_bin(&self) -> bool {
        self.kind.iter().any(|k| k == "bin")
    }

    /// Whether a binary of this target would come from the project sources
    pub fn is_launchable_from(&self, project_dir: &Path) -> bool {
        self.is_bin() && self.src_path.starts_with(project_dir)
    }
}

/// A package of the project graph
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Package {
    /// Package id, same format as `workspace_members` entries
    pub id: String,

    #[serde(default)]
    pub targets: Vec<BuildTarget>,
}

/// Decoded output of `cargo metadata`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectGraph {
    #[serde(default)]
    pub packages: Vec<Package>,

    /// Package ids of the workspace members, in workspace order
    #[serde(default)]
    pub workspace_members: Vec<String>,
}

impl ProjectGraph {
    pub fn parse(json: &str) -> KilnResult<Self> {
        Self::decode(json, "")
    }

    fn decode(stdout: &str, stderr: &str) -> KilnResult<Self> {
        serde_json::from_str(stdout).map_err(|e| KilnError::MetadataUnavailable {
            reason: format!("unable to parse cargo metadata: {}", e),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    pub fn package(&self, id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }
}

/// Run `cargo metadata` in `source_dir` and decode the result
pub async fn fetch_metadata(
    executor: &dyn Executor,
    source_dir: &Path,
) -> KilnResult<ProjectGraph> {
    let execution = Execution::new("cargo", METADATA_ARGS).with_dir(source_dir);

    let output = executor.output(&execution).await.map_err(|e| KilnError::MetadataUnavailable {
        reason: e.to_string(),
        stdout: String::new(),
        stderr: String::new(),
    })?;

    if !output.success {
        return Err(KilnError::MetadataUnavailable {
            reason: match output.code {
                Some(code) => format!("cargo metadata exited with code {}", code),
                None => "cargo metadata was terminated by a signal".to_string(),
            },
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }

    ProjectGraph::decode(&output.stdout, &output.stderr)
}
