//! `CARGO_HOME` hygiene
//!
//! Keeps the parts of the download cache that are worth persisting
//! between CI-style runs (installed binaries, registry index and crate
//! archives, git databases) and drops the unpacked sources and checkouts
//! cargo can recreate from them.

use crate::error::{KilnError, KilnResult};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Top-level `CARGO_HOME` directories that are kept
const KEEP_HOME: &[&str] = &["bin", "registry", "git"];
/// `CARGO_HOME/registry` directories that are kept
const KEEP_REGISTRY: &[&str] = &["index", "cache"];
/// `CARGO_HOME/git` directories that are kept
const KEEP_GIT: &[&str] = &["db"];

/// Prune `cargo_home` down to the directories worth caching.
///
/// Missing directories count as already pruned. Any removal failure is
/// fatal so stale content never accumulates silently.
pub fn prune_download_cache(cargo_home: &Path) -> KilnResult<()> {
    retain_dirs(cargo_home, KEEP_HOME)?;
    retain_dirs(&cargo_home.join("registry"), KEEP_REGISTRY)?;
    retain_dirs(&cargo_home.join("git"), KEEP_GIT)?;
    Ok(())
}

/// Remove every entry of `dir` that is not a directory named in `keep`
fn retain_dirs(dir: &Path, keep: &[&str]) -> KilnResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(KilnError::cache_io(
                format!("reading directory {}", dir.display()),
                e,
            ))
        }
    };

    for entry in entries {
        let entry = entry
            .map_err(|e| KilnError::cache_io(format!("reading directory {}", dir.display()), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| KilnError::cache_io(format!("reading {}", path.display()), e))?;

        let name = entry.file_name();
        if file_type.is_dir() && keep.iter().any(|k| name == *k) {
            continue;
        }

        debug!("Pruning {}", path.display());
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| KilnError::cache_io(format!("removing {}", path.display()), e))?;
    }

    Ok(())
}
