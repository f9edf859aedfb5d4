//! Software bill of materials for the application layer

use crate::cargo::executor::{Execution, Executor};
use crate::cargo::OUTPUT_INDENT;
use crate::error::{KilnError, KilnResult};
use crate::layer::Layer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Produces SBOM documents describing a layer
#[async_trait]
pub trait SbomScanner: Send + Sync {
    async fn scan(&self, layer: &Layer, app_dir: &Path) -> KilnResult<()>;
}

/// Runs `syft` and writes CycloneDX and Syft JSON next to the layer
pub struct SyftScanner<'a> {
    executor: &'a dyn Executor,
    layers_dir: PathBuf,
}

impl<'a> SyftScanner<'a> {
    pub fn new(executor: &'a dyn Executor, layers_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            layers_dir: layers_dir.into(),
        }
    }

    pub fn output_path(&self, layer: &Layer, format: &str) -> PathBuf {
        self.layers_dir.join(format!("{}.sbom.{}.json", layer.name, format))
    }

    fn execution(&self, layer: &Layer) -> Execution {
        Execution::new(
            "syft",
            [
                "packages".to_string(),
                format!("dir:{}", layer.path.display()),
                "--quiet".to_string(),
                "--output".to_string(),
                format!("cyclonedx-json={}", self.output_path(layer, "cdx").display()),
                "--output".to_string(),
                format!("syft-json={}", self.output_path(layer, "syft").display()),
            ],
        )
    }
}

#[async_trait]
impl SbomScanner for SyftScanner<'_> {
    async fn scan(&self, layer: &Layer, app_dir: &Path) -> KilnResult<()> {
        info!("Generating SBOM for {}", layer.path.display());

        let execution = self.execution(layer).with_dir(app_dir);
        let output = self
            .executor
            .stream(&execution, &|line| info!("{}{}", OUTPUT_INDENT, line))
            .await?;

        if output.success {
            Ok(())
        } else {
            Err(KilnError::command_exec(
                execution.display(),
                format!("{}\n{}", output.exit_description(), output.error_detail()),
            ))
        }
    }
}
