//! Process types for the built binaries

use crate::layer::Process;
use std::path::Path;

/// Process type that becomes the default when present
pub const DEFAULT_PROCESS_TYPE: &str = "web";

/// Init process used when tini is enabled
pub const TINI: &str = "tini";

/// One direct process per binary, launched from `<app_dir>/bin`.
///
/// `web` is the default process; without it the first one is.
pub fn build_process_types(bin_names: &[String], app_dir: &Path, tini: bool) -> Vec<Process> {
    let mut processes: Vec<Process> = bin_names
        .iter()
        .map(|name| {
            let binary = app_dir.join("bin").join(name).display().to_string();
            let (command, args) = if tini {
                (TINI.to_string(), vec!["-g".to_string(), "--".to_string(), binary])
            } else {
                (binary, vec![])
            };
            Process {
                kind: name.clone(),
                command,
                args,
                direct: true,
                default: false,
            }
        })
        .collect();

    let default = processes
        .iter()
        .position(|p| p.kind == DEFAULT_PROCESS_TYPE)
        .unwrap_or(0);
    if let Some(process) = processes.get_mut(default) {
        process.default = true;
    }

    processes
}
