//! Error types for kiln
//!
//! All modules use `KilnResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// All errors that can occur in kiln
#[derive(Error, Debug)]
pub enum KilnError {
    // Toolchain errors
    #[error("Unable to read cargo metadata: {reason}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    MetadataUnavailable {
        reason: String,
        stdout: String,
        stderr: String,
    },

    #[error("Unable to determine {tool} version: {output}")]
    VersionUnavailable { tool: String, output: String },

    #[error("Unable to parse arguments {input:?}: {reason}")]
    ArgumentParse { input: String, reason: String },

    #[error("Build failed for {target}:\n{detail}")]
    BuildFailed { target: String, detail: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigValue { key: String, reason: String },

    // Layer errors
    #[error("Invalid layer {name}: {reason}")]
    Layer { name: String, reason: String },

    // Cache errors
    #[error("Cache IO error: {context}")]
    CacheIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Unable to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, output: {output}")]
    CommandExecution { command: String, output: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl KilnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an IO error on one of the persistent caches
    pub fn cache_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::CacheIo {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MetadataUnavailable { .. } => {
                Some("Check that Cargo.toml is valid: cargo metadata --no-deps")
            }
            Self::VersionUnavailable { .. } => {
                Some("Make sure a Rust toolchain is installed and on PATH")
            }
            Self::ArgumentParse { .. } => Some("Check quoting in BP_CARGO_INSTALL_ARGS"),
            Self::CommandFailed { .. } => Some("Make sure cargo is installed and on PATH"),
            _ => None,
        }
    }
}
