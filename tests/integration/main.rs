//! Integration tests for kiln

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn kiln() -> Command {
        let mut cmd = cargo_bin_cmd!("kiln");
        for var in [
            "KILN_CONFIG",
            "CARGO_HOME",
            "CNB_LAYERS_DIR",
            "CNB_STACK_ID",
            "BP_CARGO_INSTALL_ARGS",
            "BP_CARGO_WORKSPACE_MEMBERS",
            "BP_CARGO_INSTALL_TOOLS",
            "BP_CARGO_INSTALL_TOOLS_ARGS",
            "BP_INCLUDE_FILES",
            "BP_EXCLUDE_FILES",
            "BP_CARGO_TINI",
            "BP_DISABLE_SBOM",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn cargo_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"app\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("Cargo.lock"), "version = 3\n").unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        kiln()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("incremental Cargo builds"));
    }

    #[test]
    fn version_displays() {
        kiln()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn build_help_lists_environment() {
        kiln()
            .args(["build", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("BP_CARGO_INSTALL_ARGS"))
            .stdout(predicate::str::contains("BP_CARGO_WORKSPACE_MEMBERS"))
            .stdout(predicate::str::contains("BP_DISABLE_SBOM"));
    }

    #[test]
    fn detect_passes_for_cargo_project() {
        let app = cargo_project();
        kiln()
            .arg("detect")
            .arg(app.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("is a Cargo project"));
    }

    #[test]
    fn detect_fails_without_lockfile() {
        let app = TempDir::new().unwrap();
        fs::write(app.path().join("Cargo.toml"), "[package]\n").unwrap();
        kiln().arg("detect").arg(app.path()).assert().code(100);
    }

    #[test]
    fn detect_writes_plan() {
        let app = cargo_project();
        let plan = app.path().join("plan.toml");
        kiln()
            .arg("detect")
            .arg(app.path())
            .arg("--plan")
            .arg(&plan)
            .assert()
            .success();

        let content = fs::read_to_string(plan).unwrap();
        assert!(content.contains("[[provides]]"));
        assert!(content.contains("rust-cargo"));
    }

    #[test]
    fn build_rejects_bad_quoting_before_running_cargo() {
        let app = cargo_project();
        let layers = TempDir::new().unwrap();
        kiln()
            .arg("build")
            .arg(app.path())
            .arg("--layers")
            .arg(layers.path())
            .arg("--cargo-home")
            .arg(layers.path().join("cargo-home"))
            .arg("--install-args=--features 'a b")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unable to parse arguments"))
            .stderr(predicate::str::contains("Hint:"));

        assert!(!layers.path().join("cargo-cache").exists());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let app = cargo_project();
        let layers = TempDir::new().unwrap();
        fs::write(app.path().join("kiln.toml"), "[launch]\ntini = \"sometimes\"\n").unwrap();
        kiln()
            .arg("build")
            .arg(app.path())
            .arg("--layers")
            .arg(layers.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn build_requires_existing_app_dir() {
        let layers = TempDir::new().unwrap();
        kiln()
            .args(["build", "/does/not/exist/app", "--layers"])
            .arg(layers.path())
            .arg("--cargo-home")
            .arg(layers.path().join("cargo-home"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }
}
