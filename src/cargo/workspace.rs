//! Workspace member resolution
//!
//! Turns the `workspace_members` ids of a [`ProjectGraph`] into typed
//! members and applies the user's member filter. The filter only decides
//! which members are kept; the order is always the graph's order.

use crate::cargo::metadata::ProjectGraph;
use crate::error::{KilnError, KilnResult};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// One package of the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceMember {
    /// Package name
    pub name: String,

    /// Package version, when the id carries one
    pub version: Option<String>,

    /// Source location as reported by cargo (e.g. `path+file:///ws/todo`)
    pub location: Url,

    /// The id exactly as it appeared in the metadata
    pub id: String,
}

impl WorkspaceMember {
    /// Parse a package id.
    ///
    /// Accepts the legacy `"<name> <version> (<url>)"` form, split on the
    /// first two spaces only, and the package-id-spec form
    /// `"path+file:///ws/todo#todo@1.2.0"` (or `#1.2.0`).
    pub fn parse(id: &str) -> KilnResult<Self> {
        let parts: Vec<&str> = id.splitn(3, ' ').collect();

        match parts.as_slice() {
            [name, version, location] => {
                let location = location
                    .strip_prefix('(')
                    .and_then(|l| l.strip_suffix(')'))
                    .unwrap_or(location);
                Ok(Self {
                    name: name.to_string(),
                    version: Some(version.to_string()),
                    location: parse_location(id, location)?,
                    id: id.to_string(),
                })
            }
            [spec] => Self::parse_spec(id, spec),
            _ => Err(invalid_member(id, "expected `<name> <version> (<url>)`")),
        }
    }

    fn parse_spec(id: &str, spec: &str) -> KilnResult<Self> {
        let mut location = parse_location(id, spec)?;
        let fragment = location.fragment().map(str::to_string);
        location.set_fragment(None);

        let last_segment = location
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let (name, version) = match fragment.as_deref() {
            Some(fragment) => match fragment.split_once('@') {
                Some((name, version)) => (Some(name.to_string()), Some(version.to_string())),
                None if fragment.starts_with(|c: char| c.is_ascii_digit()) => {
                    (last_segment, Some(fragment.to_string()))
                }
                None => (Some(fragment.to_string()), None),
            },
            None => (last_segment, None),
        };

        let name = name.ok_or_else(|| invalid_member(id, "unable to determine package name"))?;

        Ok(Self {
            name,
            version,
            location,
            id: id.to_string(),
        })
    }

    /// Filesystem directory of the member, percent-decoded
    pub fn path(&self) -> KilnResult<PathBuf> {
        let file_url = Url::parse(&format!("file://{}", self.location.path()))
            .map_err(|e| invalid_member(&self.id, &e.to_string()))?;
        file_url
            .to_file_path()
            .map_err(|_| invalid_member(&self.id, "location is not a local path"))
    }

    /// Whether the member lives directly at `dir`
    pub fn is_located_at(&self, dir: &Path) -> bool {
        self.path().is_ok_and(|p| p == dir)
    }
}

impl fmt::Display for WorkspaceMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

fn parse_location(id: &str, location: &str) -> KilnResult<Url> {
    Url::parse(location).map_err(|e| invalid_member(id, &format!("bad location: {}", e)))
}

fn invalid_member(id: &str, reason: &str) -> KilnError {
    KilnError::MetadataUnavailable {
        reason: format!("unable to parse workspace member {:?}: {}", id, reason),
        stdout: String::new(),
        stderr: String::new(),
    }
}

/// Comma-separated member names; an empty filter keeps everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberFilter {
    names: BTreeSet<String>,
}

impl MemberFilter {
    pub fn parse(csv: &str) -> Self {
        Self {
            names: csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn allows(&self, name: &str) -> bool {
        self.is_empty() || self.names.contains(name)
    }
}

/// Workspace members kept by `filter_csv`, in the graph's order
pub fn resolve_members(graph: &ProjectGraph, filter_csv: &str) -> KilnResult<Vec<WorkspaceMember>> {
    let filter = MemberFilter::parse(filter_csv);

    let mut members = Vec::new();
    for id in &graph.workspace_members {
        let member = WorkspaceMember::parse(id)?;
        if filter.allows(&member.name) {
            members.push(member);
        }
    }

    Ok(members)
}

/// Names of the binary targets of the kept members that are built from
/// sources under `project_dir`, in package-then-target order
pub fn resolve_binary_target_names(
    graph: &ProjectGraph,
    filter_csv: &str,
    project_dir: &Path,
) -> KilnResult<Vec<String>> {
    let kept: BTreeSet<String> = resolve_members(graph, filter_csv)?
        .into_iter()
        .map(|m| m.id)
        .collect();

    Ok(graph
        .packages
        .iter()
        .filter(|p| kept.contains(&p.id))
        .flat_map(|p| p.targets.iter())
        .filter(|t| t.is_launchable_from(project_dir))
        .map(|t| t.name.clone())
        .collect())
}
