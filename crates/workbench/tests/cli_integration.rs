//! CLI integration tests for the workbench command-line interface.
//!
//! These tests cover argument parsing and the commands that work without a
//! server. State and config directories are pointed at temporary
//! directories so nothing touches the real user profile.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the workbench binary, isolated from the user's
/// configuration and state.
fn workbench(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("workbench").unwrap();
    cmd.current_dir(home.path())
        .env("WORKBENCH_CONFIG_DIR", home.path().join("config"))
        .env("WORKBENCH_STATE_DIR", home.path().join("state"))
        .env_remove("WORKBENCH_SERVER_URL")
        .env_remove("WORKBENCH_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workbench"));
}

#[test]
fn test_version_displays() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("workbench"));
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("save"))
        .stdout(predicate::str::contains("session"));
}

#[test]
fn test_build_help_shows_flags() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--no-wait"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Validation Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_extract_requires_document() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .arg("extract")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--document"));
}

#[test]
fn test_save_requires_source_file() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["save", "config.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let home = TempDir::new().unwrap();
    workbench(&home).arg("deploy").assert().failure();
}

#[test]
fn test_missing_explicit_config_fails() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["--config", "missing.toml", "session"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_session_show_empty() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No open tabs"));
}

#[test]
fn test_session_show_json() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["--json", "session", "--workspace", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"workspace\": \"acme\""))
        .stdout(predicate::str::contains("\"fraction\""));
}

#[test]
fn test_session_clear() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["session", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared session default/default"));
}

#[test]
fn test_project_config_sets_session_scope() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("workbench.toml"),
        "[session]\nworkspace = \"team\"\ndocument = \"ledger\"\n",
    )
    .unwrap();
    workbench(&home)
        .args(["session", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("team/ledger"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_build_against_unreachable_server_fails() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["--server", "http://127.0.0.1:9", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Environment build failed"));
}

#[test]
fn test_save_reports_missing_source_file() {
    let home = TempDir::new().unwrap();
    workbench(&home)
        .args(["save", "config.toml", "--from", "nope.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
