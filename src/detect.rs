//! Project detection
//!
//! A directory is a cargo project when it has both `Cargo.toml` and
//! `Cargo.lock` at its root.

use crate::error::{KilnError, KilnResult};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Capability this tool provides to later build steps
pub const PLAN_ENTRY_RUST_CARGO: &str = "rust-cargo";

/// SBOM tooling needed during the build
pub const PLAN_ENTRY_SYFT: &str = "syft";

/// Rust toolchain needed during the build
pub const PLAN_ENTRY_RUST: &str = "rust";

const REQUIRED_FILES: [&str; 2] = ["Cargo.toml", "Cargo.lock"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub name: String,
}

impl PlanEntry {
    fn named(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

/// What a passing detection provides and requires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub provides: Vec<PlanEntry>,
    pub requires: Vec<PlanEntry>,
}

impl Default for BuildPlan {
    fn default() -> Self {
        Self {
            provides: vec![PlanEntry::named(PLAN_ENTRY_RUST_CARGO)],
            requires: vec![
                PlanEntry::named(PLAN_ENTRY_SYFT),
                PlanEntry::named(PLAN_ENTRY_RUST_CARGO),
                PlanEntry::named(PLAN_ENTRY_RUST),
            ],
        }
    }
}

impl BuildPlan {
    pub fn to_toml(&self) -> KilnResult<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Whether `app_dir` holds a cargo project.
///
/// Missing files mean "not applicable"; any other stat failure is an error.
pub fn detect(app_dir: &Path) -> KilnResult<bool> {
    for file in REQUIRED_FILES {
        let path = app_dir.join(file);
        match fs::metadata(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(KilnError::io(
                    format!("unable to determine if {} exists", path.display()),
                    e,
                ))
            }
        }
    }
    Ok(true)
}

/// [`detect`] plus the build plan of a passing project
pub fn detect_plan(app_dir: &Path) -> KilnResult<Option<BuildPlan>> {
    Ok(detect(app_dir)?.then(BuildPlan::default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fails_without_cargo_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.lock"), "").unwrap();
        assert!(!detect(dir.path()).unwrap());
    }

    #[test]
    fn fails_without_cargo_lock() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        assert!(!detect(dir.path()).unwrap());
        assert!(detect_plan(dir.path()).unwrap().is_none());
    }

    #[test]
    fn passes_with_both() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        fs::write(dir.path().join("Cargo.lock"), "").unwrap();
        assert!(detect(dir.path()).unwrap());

        let plan = detect_plan(dir.path()).unwrap().unwrap();
        assert_eq!(plan.provides, vec![PlanEntry::named("rust-cargo")]);
        assert_eq!(plan.requires.len(), 3);
        assert!(plan.to_toml().unwrap().contains("[[requires]]"));
    }

    #[cfg(unix)]
    #[test]
    fn stat_failure_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        // a regular file where a directory is expected gives ENOTDIR, not ENOENT
        let not_a_dir = dir.path().join("Cargo.toml");
        assert!(detect(&not_a_dir).is_err());
    }
}
