//! Source removal after a build
//!
//! The built image only needs the binaries. Everything at the top of the
//! application directory is deleted unless a retention pattern keeps it,
//! then `<app>/bin` is recreated with links into the application layer.

use crate::cache::target::{remove_any, TARGET_DIR};
use crate::error::{KilnError, KilnResult};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory of `<app>` that receives the binary links
pub const APP_BIN_DIR: &str = "bin";

/// Which top-level entries of the application survive cleanup
#[derive(Debug, Clone, Default)]
pub struct SourceRetention {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl SourceRetention {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> KilnResult<Self> {
        Ok(Self {
            include: compile("include_files", include)?,
            exclude: compile("exclude_files", exclude)?,
        })
    }

    /// Split a `:`-separated pattern list, dropping empty entries
    pub fn split_list(list: &str) -> Vec<String> {
        list.split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether the top-level entry `name` is kept
    pub fn keeps(&self, name: &str) -> bool {
        if name == TARGET_DIR || name == APP_BIN_DIR {
            return false;
        }
        self.include.iter().any(|p| p.matches(name))
            && !self.exclude.iter().any(|p| p.matches(name))
    }

    /// Delete every top-level entry of `app_dir` that is not kept.
    /// Returns the removed paths.
    pub fn clean(&self, app_dir: &Path) -> KilnResult<Vec<PathBuf>> {
        let listing = |e| KilnError::io(format!("listing {}", app_dir.display()), e);
        let entries = fs::read_dir(app_dir).map_err(listing)?;

        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(listing)?;
            let name = entry.file_name();
            if self.keeps(&name.to_string_lossy()) {
                debug!("Keeping {}", entry.path().display());
                continue;
            }
            remove_any(&entry.path())?;
            removed.push(entry.path());
        }

        removed.sort();
        Ok(removed)
    }
}

fn compile<S: AsRef<str>>(key: &str, patterns: &[S]) -> KilnResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p.as_ref()).map_err(|e| KilnError::ConfigValue {
                key: key.to_string(),
                reason: format!("invalid pattern {:?}: {}", p.as_ref(), e),
            })
        })
        .collect()
}

/// Mirror `layer_bin` into `app_bin`: directories are recreated, files
/// become symlinks to the layer copy. Returns the number of links.
pub fn link_binaries(layer_bin: &Path, app_bin: &Path) -> KilnResult<usize> {
    fs::create_dir_all(app_bin)
        .map_err(|e| KilnError::io(format!("creating {}", app_bin.display()), e))?;

    if !layer_bin.is_dir() {
        return Ok(0);
    }

    let mut linked = 0;
    for entry in WalkDir::new(layer_bin).follow_links(false).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| KilnError::Walk {
            path: layer_bin.to_path_buf(),
            source: e,
        })?;
        let relative = entry.path().strip_prefix(layer_bin).unwrap_or(entry.path());
        let destination = app_bin.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|e| KilnError::io(format!("creating {}", destination.display()), e))?;
            continue;
        }

        symlink_file(entry.path(), &destination).map_err(|e| {
            KilnError::io(
                format!("linking {} to {}", destination.display(), entry.path().display()),
                e,
            )
        })?;
        linked += 1;
    }

    Ok(linked)
}

#[cfg(unix)]
fn symlink_file(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink_file(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}
