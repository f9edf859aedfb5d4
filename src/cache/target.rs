//! Artifact cache link
//!
//! `<app>/target` is replaced by a symlink to the cache layer so every
//! cargo invocation writes its compiled objects into persistent storage.

use crate::error::{KilnError, KilnResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of cargo's build output directory inside a project
pub const TARGET_DIR: &str = "target";

/// Replace `<project_dir>/target` with a symlink to `cache_dir`.
///
/// Whatever was at `target` before (a pushed build directory, a stale
/// link, a file) is removed first, so calling this again is harmless.
pub fn link_build_output(project_dir: &Path, cache_dir: &Path) -> KilnResult<PathBuf> {
    let target = project_dir.join(TARGET_DIR);

    remove_any(&target)?;

    fs::create_dir_all(cache_dir).map_err(|e| {
        KilnError::cache_io(format!("creating cache directory {}", cache_dir.display()), e)
    })?;

    symlink_dir(cache_dir, &target).map_err(|e| {
        KilnError::cache_io(
            format!("linking {} to {}", target.display(), cache_dir.display()),
            e,
        )
    })?;

    info!("Creating cached target directory {}", target.display());
    Ok(target)
}

/// Remove a file, symlink or directory tree, tolerating its absence
pub(crate) fn remove_any(path: &Path) -> KilnResult<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(KilnError::cache_io(format!("reading {}", path.display()), e)),
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| KilnError::cache_io(format!("removing {}", path.display()), e))
}

#[cfg(unix)]
fn symlink_dir(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink_dir(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(original, link)
}
