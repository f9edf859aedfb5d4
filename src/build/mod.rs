//! Build orchestration
//!
//! One [`Build::run`] takes an application directory from sources to an
//! image layout:
//!
//! 1. `<app>/target` is linked into the `cargo-cache` layer
//! 2. the toolchain versions and the project files are fingerprinted
//! 3. if the `rust-application` layer was built from the same fingerprint
//!    it is reused, otherwise it is rebuilt:
//!    restore mtimes, install tools, resolve members, `cargo install`,
//!    scan (unless disabled), preserve mtimes, record the fingerprint
//! 4. process types are derived from the binary targets
//! 5. the sources are removed and `<app>/bin` links to the installed
//!    binaries
//!
//! Any error aborts the build. A failed rebuild leaves no fingerprint
//! behind, so the next run rebuilds again.

pub mod process;
pub mod sbom;
pub mod source;

pub use process::build_process_types;
pub use sbom::{SbomScanner, SyftScanner};
pub use source::{link_binaries, SourceRetention};

use crate::cache::link_build_output;
use crate::cargo::executor::Executor;
use crate::cargo::metadata::{fetch_metadata, ProjectGraph};
use crate::cargo::runner::CargoRunner;
use crate::cargo::workspace::{resolve_binary_target_names, resolve_members, WorkspaceMember};
use crate::config::BuildConfig;
use crate::error::KilnResult;
use crate::fingerprint::{build_fingerprint, BuildInputs};
use crate::layer::{Label, Layer, LayerStore, LayerTypes, Process, APPLICATION_LAYER, CACHE_LAYER};
use crate::mtimes::{restore_all, snapshot_all};
use source::APP_BIN_DIR;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Image label set when the application layer is not scanned
pub const SBOM_DISABLED_LABEL: &str = "io.paketo.sbom.disabled";

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub layers: Vec<Layer>,
    pub processes: Vec<Process>,
    pub labels: Vec<Label>,

    /// False when the application layer was reused
    pub rebuilt: bool,
}

/// How `cargo install` is invoked for the resolved members
#[derive(Debug, Clone, PartialEq, Eq)]
enum InstallPlan {
    /// One invocation with the default path `.`
    Project { no_members: bool },

    /// One invocation per member directory
    PerMember(Vec<PathBuf>),
}

impl InstallPlan {
    fn decide(members: &[WorkspaceMember], path_set: bool, app_dir: &Path) -> KilnResult<Self> {
        match members {
            [] => Ok(Self::Project { no_members: true }),
            [only] if only.is_located_at(app_dir) => Ok(Self::Project { no_members: false }),
            _ if path_set => Ok(Self::Project { no_members: false }),
            _ => Ok(Self::PerMember(
                members.iter().map(WorkspaceMember::path).collect::<KilnResult<_>>()?,
            )),
        }
    }
}

/// Builds one application
pub struct Build<'a> {
    config: &'a BuildConfig,
    executor: &'a dyn Executor,
}

impl<'a> Build<'a> {
    pub fn new(config: &'a BuildConfig, executor: &'a dyn Executor) -> Self {
        Self { config, executor }
    }

    pub async fn run(&self) -> KilnResult<BuildResult> {
        let config = self.config;
        let store = LayerStore::new(&config.layers_dir);

        let cache_layer = store.layer(CACHE_LAYER, LayerTypes::cache())?;
        cache_layer.write()?;
        link_build_output(&config.app_dir, &cache_layer.path)?;

        let mut app_layer = store.layer(APPLICATION_LAYER, LayerTypes::cache_and_launch())?;
        let runner = CargoRunner::new(
            self.executor,
            &config.cargo_home,
            &cache_layer.path,
            config.install_args.clone(),
            &config.stack,
        );

        let cargo_version = runner.cargo_version().await?;
        let rust_version = runner.rust_version().await?;
        debug!("cargo {}, rustc {}", cargo_version, rust_version);

        let expected = build_fingerprint(
            &config.app_dir,
            &BuildInputs {
                cargo_version: &cargo_version,
                rust_version: &rust_version,
                install_args: config.install_args.raw(),
                workspace_members: &config.workspace_members,
                stack: &config.stack,
                tools: &config.install_tools,
                tools_args: &config.install_tools_args,
                extra: &config.metadata,
            },
        )?;

        let (graph, rebuilt) = if app_layer.metadata_matches(&expected) {
            info!("Reusing cached layer {}", app_layer.path.display());
            (fetch_metadata(self.executor, &config.app_dir).await?, false)
        } else {
            info!("Contributing {} layer", app_layer.name);
            app_layer.reset()?;
            let graph = self.contribute(&app_layer, &cache_layer, &runner).await?;
            app_layer.metadata = expected;
            app_layer.write()?;
            (graph, true)
        };

        let bin_names =
            resolve_binary_target_names(&graph, &config.workspace_members, &config.app_dir)?;
        let processes = build_process_types(&bin_names, &config.app_dir, config.tini);

        self.remove_sources(&app_layer)?;

        let mut labels = Vec::new();
        if config.disable_sbom {
            labels.push(Label::new(SBOM_DISABLED_LABEL, "true"));
        }

        Ok(BuildResult {
            layers: vec![cache_layer, app_layer],
            processes,
            labels,
            rebuilt,
        })
    }

    async fn contribute(
        &self,
        app_layer: &Layer,
        cache_layer: &Layer,
        runner: &CargoRunner<'_>,
    ) -> KilnResult<ProjectGraph> {
        let config = self.config;
        let roots = [
            cache_layer.path.as_path(),
            config.cargo_home.as_path(),
            app_layer.path.as_path(),
        ];

        info!("Restoring file modification times");
        restore_all(&roots)?;

        for tool in &config.install_tools {
            info!("Installing tool {}", tool);
            runner.install_tool(tool, &config.install_tools_args).await?;
        }

        let graph = fetch_metadata(self.executor, &config.app_dir).await?;
        let members = resolve_members(&graph, &config.workspace_members)?;

        let path_set = runner.install_args().is_path_set();
        match InstallPlan::decide(&members, path_set, &config.app_dir)? {
            InstallPlan::Project { no_members } => {
                if no_members {
                    warn!(
                        "No workspace members detected, trying to install with no path. \
                         This may fail."
                    );
                }
                runner.install(&config.app_dir, &app_layer.path).await?;
            }
            InstallPlan::PerMember(paths) => {
                for path in paths {
                    let member_path = path.display().to_string();
                    runner
                        .install_member(&member_path, &config.app_dir, &app_layer.path)
                        .await?;
                }
            }
        }

        if config.disable_sbom {
            info!("Skipping SBOM scan");
        } else {
            SyftScanner::new(self.executor, &config.layers_dir)
                .scan(app_layer, &config.app_dir)
                .await?;
        }

        info!("Preserving file modification times");
        snapshot_all(&roots)?;

        Ok(graph)
    }

    fn remove_sources(&self, app_layer: &Layer) -> KilnResult<()> {
        let app_dir = &self.config.app_dir;

        info!("Removing source code");
        let removed = self.config.retention.clean(app_dir)?;
        debug!("Removed {} entries from {}", removed.len(), app_dir.display());

        let app_bin = app_dir.join(APP_BIN_DIR);
        let linked = link_binaries(&app_layer.path.join("bin"), &app_bin)?;
        debug!("Linked {} binaries into {}", linked, app_bin.display());

        app_layer.append_launch_env("PATH", &app_bin, ":")
    }
}
