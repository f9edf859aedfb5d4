//! Persistent build caches
//!
//! Two directories survive between builds:
//!
//! | Cache | Owner | Hygiene |
//! |-------|-------|---------|
//! | Artifact cache | the `cargo-cache` layer, linked as `<app>/target` | kept whole |
//! | Download cache | `CARGO_HOME` | pruned after every install |

pub mod home;
pub mod target;

pub use home::prune_download_cache;
pub use target::{link_build_output, TARGET_DIR};
