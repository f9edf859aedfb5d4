//! Kiln - incremental Cargo builds for container images
//!
//! Builds the binaries of a Cargo project or workspace into a cached
//! layer, keeps cargo's incremental state warm between builds, and
//! replaces the sources with links to the installed binaries.

pub mod build;
pub mod cache;
pub mod cargo;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod fingerprint;
pub mod layer;
pub mod mtimes;

pub use build::{Build, BuildResult};
pub use detect::detect;
pub use error::{KilnError, KilnResult};
