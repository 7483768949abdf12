#![allow(deprecated)] // TODO: move from Command::cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;

/// Binary with no settings file or overrides leaking in from the caller
fn pageship(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("pageship").unwrap();
    cmd.current_dir(dir)
        .env_remove("PAGESHIP_CONFIG_PATH")
        .env_remove("PAGESHIP_ENGINE")
        .env_remove("PAGESHIP_IMAGE")
        .env_remove("PAGESHIP_TAG")
        .env_remove("PAGESHIP_PLATFORMS")
        .env_remove("PAGESHIP_BUILDER")
        .env_remove("PAGESHIP_TEST_PORT");
    cmd
}

#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--test"))
        .stdout(predicate::str::contains("--no-push"))
        .stdout(predicate::str::contains("--cleanup"))
        .stdout(predicate::str::contains("Checking prerequisites").not());
}

#[test]
fn test_cli_short_help() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

/// Help wins even when combined with other flags
#[test]
fn test_help_with_other_flags_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .args(["--test", "--cleanup", "--help"])
        .env("PAGESHIP_ENGINE", "pageship-no-such-engine")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checking prerequisites").not());
}

#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pageship"));
}

#[test]
fn test_unknown_flag_fails_before_any_step() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .arg("--frobnicate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument"))
        .stderr(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("Checking prerequisites").not());
}

#[test]
fn test_no_push_with_test_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .args(["--no-push", "--test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"))
        .stdout(predicate::str::contains("Checking prerequisites").not());
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .args(["--config", "does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to load settings"));
}

#[test]
fn test_invalid_port_override() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .env("PAGESHIP_TEST_PORT", "not-a-port")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("PAGESHIP_TEST_PORT"));
}

/// A missing engine binary fails the prerequisite stage without touching anything
#[test]
fn test_missing_engine_fails_prerequisites() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .env("PAGESHIP_ENGINE", "pageship-no-such-engine")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Checking prerequisites"))
        .stdout(predicate::str::contains("Building").not())
        .stderr(predicate::str::contains("check prerequisites failed"))
        .stderr(predicate::str::contains("pageship-no-such-engine not found"));
}

#[test]
fn test_settings_file_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("pageship.yaml"),
        "engine: pageship-no-such-engine\nimage: ghcr.io/acme/landing\n",
    )
    .unwrap();

    pageship(dir.path())
        .arg("--no-push")
        .assert()
        .failure()
        .stdout(predicate::str::contains("ghcr.io/acme/landing:latest"))
        .stdout(predicate::str::contains("check prerequisites → set up builder → build"));
}

#[test]
fn test_smoke_test_window_in_summary() {
    let dir = tempfile::tempdir().unwrap();
    pageship(dir.path())
        .arg("--test")
        .env("PAGESHIP_ENGINE", "pageship-no-such-engine")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Smoke test: http://localhost:8080 (10 checks within 27.5s)",
        ));
}

/// Needs docker with buildx and push access to the configured image
#[test]
#[ignore = "requires a running docker daemon with buildx"]
fn test_local_build_against_real_engine() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    pageship(&root)
        .args(["--no-push", "--cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Local build only"));
}
