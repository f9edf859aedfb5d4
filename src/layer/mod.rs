//! Persistent layer directories
//!
//! A layers directory holds one subdirectory per layer plus a
//! `<name>.toml` file describing it:
//!
//! ```toml
//! [types]
//! cache = true
//! launch = true
//!
//! [metadata]
//! cargo-version = "1.78.0"
//! ```
//!
//! The `[metadata]` table is what the build fingerprint is compared
//! against. `launch.toml` at the top of the layers directory lists the
//! process types and labels of the image.

pub mod launch;
pub mod store;

pub use launch::{Label, LaunchFile, Process};
pub use store::{Layer, LayerStore, LayerTypes, APPLICATION_LAYER, CACHE_LAYER};
