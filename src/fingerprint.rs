//! Build fingerprint
//!
//! The application layer records the inputs of the build that produced it.
//! When the next build has the same inputs the layer is reused as is.

use crate::error::{KilnError, KilnResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Inputs of one application build
#[derive(Debug, Clone)]
pub struct BuildInputs<'a> {
    pub cargo_version: &'a str,
    pub rust_version: &'a str,
    pub install_args: &'a str,
    pub workspace_members: &'a str,
    pub stack: &'a str,
    pub tools: &'a [String],
    pub tools_args: &'a [String],
    pub extra: &'a BTreeMap<String, String>,
}

/// Layer metadata describing a build. Extra pairs override computed keys.
pub fn build_fingerprint(
    app_dir: &Path,
    inputs: &BuildInputs<'_>,
) -> KilnResult<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    metadata.insert("cargo-version".to_string(), inputs.cargo_version.to_string());
    metadata.insert("rust-version".to_string(), inputs.rust_version.to_string());
    metadata.insert("files".to_string(), file_listing_hash(app_dir)?);
    metadata.insert("additional-arguments".to_string(), inputs.install_args.to_string());
    metadata.insert("workspace-members".to_string(), inputs.workspace_members.to_string());
    metadata.insert("stack".to_string(), inputs.stack.to_string());
    metadata.insert("tools".to_string(), inputs.tools.join(" "));
    metadata.insert("tools-args".to_string(), inputs.tools_args.join(" "));

    for (key, value) in inputs.extra {
        metadata.insert(key.clone(), value.clone());
    }

    Ok(metadata)
}

/// SHA-256 over the relative path and content of every entry under `root`.
///
/// Symlinks are hashed by their destination and never followed, so the
/// linked artifact cache does not contribute.
pub fn file_listing_hash(root: &Path) -> KilnResult<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| KilnError::Walk {
            path: root.to_path_buf(),
            source: e,
        })?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let file_type = entry.file_type();

        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);

        if file_type.is_symlink() {
            let destination = fs::read_link(entry.path())
                .map_err(|e| KilnError::io(format!("reading link {}", entry.path().display()), e))?;
            hasher.update(b"->");
            hasher.update(destination.to_string_lossy().as_bytes());
        } else if file_type.is_file() {
            let mut file = File::open(entry.path())
                .map_err(|e| KilnError::io(format!("opening {}", entry.path().display()), e))?;
            io::copy(&mut file, &mut hasher)
                .map_err(|e| KilnError::io(format!("hashing {}", entry.path().display()), e))?;
        }
        hasher.update([0u8]);
    }

    Ok(hex::encode(hasher.finalize()))
}
