//! End-to-end CLI tests.
//!
//! Every test runs in its own temporary directory with `HOME` pointed at it,
//! so the default plugin directory and configuration lookup stay isolated.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn cadence(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("cadence");
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, content: &str) {
    fs::write(dir.join("cadence.toml"), content).expect("failed to write cadence.toml");
}

#[test]
fn test_version_command() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cadence"));
}

#[test]
fn test_help_command() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plugin"))
        .stdout(predicate::str::contains("hook"));
}

#[test]
fn test_plugin_list_empty() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .args(["plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins configured."))
        .stdout(predicate::str::contains("No plugin binaries"));

    assert!(temp_dir.path().join(".cadence").join("plugins").is_dir());
}

#[test]
fn test_plugin_list_shows_configured_and_discovered() {
    let temp_dir = TempDir::new().unwrap();
    let plugins = temp_dir.path().join("bin");
    fs::create_dir(&plugins).unwrap();
    let binary = plugins.join("cadence-plugin-slack");
    fs::write(&binary, "#!/bin/sh\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
    }

    write_config(
        temp_dir.path(),
        &format!(
            r#"
[host]
plugin_dir = "{}"

[[plugins]]
name = "slack"

[[plugins]]
name = "npm"
enabled = false
"#,
            plugins.display()
        ),
    );

    cadence(temp_dir.path())
        .args(["plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("slack"))
        .stdout(predicate::str::contains("npm (disabled)  (binary not found)"))
        .stdout(predicate::str::contains("Plugin binaries in"));
}

#[test]
fn test_hook_without_plugins() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .args(["hook", "post-publish", "--version", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugin handles post-publish."));
}

#[test]
fn test_hook_dry_run_banner() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .args(["hook", "pre-version", "--version", "1.0.0", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn test_hook_unknown_name() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .args(["hook", "post-party", "--version", "1.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown hook: post-party"));
}

#[test]
fn test_hook_requires_version() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .args(["hook", "post-publish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--version"));
}

#[test]
fn test_hook_fails_when_plugin_binary_missing() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        temp_dir.path(),
        r#"
[[plugins]]
name = "ghost"
"#,
    );

    cadence(temp_dir.path())
        .args(["hook", "post-publish", "--version", "1.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 plugin(s) could not be loaded"));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    write_config(temp_dir.path(), "[[plugins]]\nname = \"\"\n");

    cadence(temp_dir.path())
        .args(["plugin", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn test_explicit_config_path() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("elsewhere.toml");

    cadence(temp_dir.path())
        .args(["--config"])
        .arg(&missing)
        .args(["plugin", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("elsewhere.toml"));
}

#[test]
fn test_validate_unconfigured_plugin() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .args(["plugin", "validate", "slack"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plugin slack is not configured"));
}

#[test]
fn test_validate_without_plugins() {
    let temp_dir = TempDir::new().unwrap();
    cadence(temp_dir.path())
        .args(["plugin", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins to validate."));
}
