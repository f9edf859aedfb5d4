//! Cargo toolchain integration
//!
//! | Module       | Concern                                         |
//! |--------------|-------------------------------------------------|
//! | `executor`   | Process seam: capture or stream a child process |
//! | `args`       | `cargo install` argument filtering and defaults |
//! | `metadata`   | `cargo metadata` project graph                  |
//! | `workspace`  | Member ids, member filter, binary target names  |
//! | `runner`     | Version probes and `cargo install` invocations  |

pub mod args;
pub mod executor;
pub mod metadata;
pub mod runner;
pub mod workspace;

pub use args::{InstallArgs, TINY_STACK_ID};
pub use executor::{CapturedOutput, Execution, Executor, StreamedOutput, TokioExecutor};
pub use metadata::{fetch_metadata, BuildTarget, Package, ProjectGraph};
pub use runner::{CargoRunner, OUTPUT_INDENT};
pub use workspace::{resolve_binary_target_names, resolve_members, MemberFilter, WorkspaceMember};
