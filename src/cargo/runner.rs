//! Cargo invocations
//!
//! [`CargoRunner`] runs `cargo install` for the application and for extra
//! tools, and probes toolchain versions. Each install gets its own
//! environment map; the process environment is never modified.

use crate::cache::prune_download_cache;
use crate::cargo::args::InstallArgs;
use crate::cargo::executor::{Execution, Executor};
use crate::error::{KilnError, KilnResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix applied to every line of build tool output in the log
pub const OUTPUT_INDENT: &str = "      ";

/// Runs cargo through an [`Executor`]
pub struct CargoRunner<'a> {
    executor: &'a dyn Executor,
    cargo_home: PathBuf,
    target_dir: PathBuf,
    install_args: InstallArgs,
    stack: String,
}

impl<'a> CargoRunner<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        cargo_home: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        install_args: InstallArgs,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            cargo_home: cargo_home.into(),
            target_dir: target_dir.into(),
            install_args,
            stack: stack.into(),
        }
    }

    pub fn install_args(&self) -> &InstallArgs {
        &self.install_args
    }

    /// Version reported by `cargo version`
    pub async fn cargo_version(&self) -> KilnResult<String> {
        self.version("cargo", &["version"]).await
    }

    /// Version reported by `rustc --version`
    pub async fn rust_version(&self) -> KilnResult<String> {
        self.version("rustc", &["--version"]).await
    }

    async fn version(&self, tool: &str, args: &[&str]) -> KilnResult<String> {
        let output = self
            .executor
            .output(&Execution::new(tool, args.iter().copied()))
            .await?;

        let combined = output.combined();
        let unavailable = || KilnError::VersionUnavailable {
            tool: tool.to_string(),
            output: combined.trim().to_string(),
        };

        if !output.success {
            return Err(unavailable());
        }

        // `cargo 1.78.0 (54d8815d0 2024-03-26)`: the version is the second field
        combined
            .split_whitespace()
            .nth(1)
            .map(str::to_string)
            .ok_or_else(unavailable)
    }

    /// Environment of one cargo child process
    fn environment(&self, dest_layer: &Path) -> BTreeMap<String, String> {
        let layer_bin = dest_layer.join("bin").display().to_string();
        let path = match std::env::var("PATH") {
            Ok(inherited) if !inherited.is_empty() => format!("{}:{}", layer_bin, inherited),
            _ => layer_bin,
        };

        let mut env = BTreeMap::new();
        env.insert("CARGO_HOME".to_string(), self.cargo_home.display().to_string());
        env.insert(
            "CARGO_TARGET_DIR".to_string(),
            self.target_dir.display().to_string(),
        );
        // keeps `cargo install` from warning that the root is not on PATH
        env.insert("PATH".to_string(), path);
        env
    }

    /// `cargo install` the whole project found at `src_dir`
    pub async fn install(&self, src_dir: &Path, dest_layer: &Path) -> KilnResult<()> {
        self.install_member(".", src_dir, dest_layer).await
    }

    /// `cargo install` one member, defaulting `--path` to `member_path`
    ///
    /// The download cache is pruned after a successful build.
    pub async fn install_member(
        &self,
        member_path: &str,
        src_dir: &Path,
        dest_layer: &Path,
    ) -> KilnResult<()> {
        let args = self.install_args.build(dest_layer, member_path, &self.stack);
        let execution = Execution::new("cargo", args)
            .with_dir(src_dir)
            .with_env(self.environment(dest_layer));

        self.run(&execution, member_path).await?;

        prune_download_cache(&self.cargo_home)
    }

    /// `cargo install <name> <args...>` into `CARGO_HOME`
    pub async fn install_tool(&self, name: &str, tool_args: &[String]) -> KilnResult<()> {
        let mut args = vec!["install".to_string(), name.to_string()];
        args.extend(tool_args.iter().cloned());

        let execution = Execution::new("cargo", args).with_env(self.environment(&self.cargo_home));

        self.run(&execution, name).await
    }

    async fn run(&self, execution: &Execution, target: &str) -> KilnResult<()> {
        info!("{}", execution.display());

        let output = self
            .executor
            .stream(execution, &|line| info!("{}{}", OUTPUT_INDENT, line))
            .await?;

        if output.success {
            Ok(())
        } else {
            Err(KilnError::BuildFailed {
                target: target.to_string(),
                detail: format!("{}\n{}", output.exit_description(), output.error_detail()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cargo::executor::fake::{FakeExecutor, Reply};
    use std::fs;
    use tempfile::TempDir;

    fn runner<'a>(
        executor: &'a FakeExecutor,
        cargo_home: &Path,
        install_args: &str,
    ) -> CargoRunner<'a> {
        CargoRunner::new(
            executor,
            cargo_home,
            "/cache/target",
            InstallArgs::parse(install_args).unwrap(),
            "io.buildpacks.stacks.jammy",
        )
    }

    #[tokio::test]
    async fn fetches_cargo_version() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|e| {
            assert_eq!(e.args, vec!["version"]);
            Reply::ok("cargo 1.2.3 (4369396ce 2021-04-27)\n")
        });
        assert_eq!(runner(&executor, home.path(), "").cargo_version().await.unwrap(), "1.2.3");
    }

    #[tokio::test]
    async fn fetches_rust_version() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|e| {
            assert_eq!(e.command, "rustc");
            Reply::ok("rustc 1.2.3 (53cb7b09b 2021-06-17)\n")
        });
        assert_eq!(runner(&executor, home.path(), "").rust_version().await.unwrap(), "1.2.3");
    }

    #[tokio::test]
    async fn version_failure_reports_output() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_| Reply::fail("error: no default toolchain"));
        let err = runner(&executor, home.path(), "").cargo_version().await.unwrap_err();
        assert!(matches!(err, KilnError::VersionUnavailable { .. }));
        assert!(err.to_string().contains("no default toolchain"));
    }

    #[tokio::test]
    async fn installs_with_defaults() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_| Reply::ok("Compiling basics v0.1.0"));

        runner(&executor, home.path(), "")
            .install(Path::new("/does/not/matter"), Path::new("/some/location/2"))
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec!["install", "--path=.", "--color=never", "--root=/some/location/2"]
        );
        assert_eq!(calls[0].dir.as_deref(), Some(Path::new("/does/not/matter")));
    }

    #[tokio::test]
    async fn installs_with_custom_args() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_| Reply::ok(""));

        runner(&executor, home.path(), "--path=./todo --foo=baz bar")
            .install(Path::new("/does/not/matter"), Path::new("/some/location/2"))
            .await
            .unwrap();

        assert_eq!(
            executor.calls()[0].args,
            vec![
                "install",
                "--path=./todo",
                "--foo=baz",
                "bar",
                "--color=never",
                "--root=/some/location/2",
            ]
        );
    }

    #[tokio::test]
    async fn install_environment_is_per_invocation() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_| Reply::ok(""));
        let before = std::env::var("PATH").ok();

        runner(&executor, home.path(), "")
            .install_member("/workspace/todo", Path::new("/workspace"), Path::new("/layers/app"))
            .await
            .unwrap();

        let env = &executor.calls()[0].env;
        assert_eq!(env["CARGO_HOME"], home.path().display().to_string());
        assert_eq!(env["CARGO_TARGET_DIR"], "/cache/target");
        assert!(env["PATH"].starts_with("/layers/app/bin"));
        assert_eq!(std::env::var("PATH").ok(), before);
    }

    #[tokio::test]
    async fn install_failure_is_build_failed() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_| Reply::fail("error[E0425]: cannot find value `x`"));

        let err = runner(&executor, home.path(), "")
            .install_member("/workspace/todo", Path::new("/workspace"), Path::new("/layers/app"))
            .await
            .unwrap_err();

        match err {
            KilnError::BuildFailed { target, detail } => {
                assert_eq!(target, "/workspace/todo");
                assert!(detail.contains("exit code 101"));
                assert!(detail.contains("cannot find value"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn install_prunes_cargo_home() {
        let home = TempDir::new().unwrap();
        fs::create_dir_all(home.path().join("registry/src")).unwrap();
        fs::create_dir_all(home.path().join("registry/index")).unwrap();
        let executor = FakeExecutor::new(|_| Reply::ok(""));

        runner(&executor, home.path(), "")
            .install(Path::new("/workspace"), Path::new("/layers/app"))
            .await
            .unwrap();

        assert!(!home.path().join("registry/src").exists());
        assert!(home.path().join("registry/index").exists());
    }

    #[tokio::test]
    async fn installs_tool_with_args() {
        let home = TempDir::new().unwrap();
        let executor = FakeExecutor::new(|_| Reply::ok(""));

        runner(&executor, home.path(), "--path ./ignored")
            .install_tool("diesel_cli", &["--no-default-features".to_string()])
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls[0].args, vec!["install", "diesel_cli", "--no-default-features"]);
        assert!(calls[0].dir.is_none());
    }
}
