//! Basic CLI tests for the gcdesk-plugins command-line interface.

use assert_cmd::Command;
use predicates::prelude::*;

fn gcdesk_plugins() -> Command {
    let mut cmd = Command::cargo_bin("gcdesk-plugins").unwrap();
    cmd.env_remove("GCDESK_PLUGIN_DIR")
        .env_remove("GCDESK_HOST_VERSION")
        .env_remove("GCDESK_LOG_JSON")
        .env_remove("RUST_LOG");
    cmd
}

fn native_name(stem: &str) -> String {
    format!("{}.{}", stem, std::env::consts::DLL_EXTENSION)
}

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    gcdesk_plugins()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("--dir"))
        .stdout(predicate::str::contains("--strict-host-version"));
}

/// Test that the CLI shows version information.
#[test]
fn test_cli_version() {
    gcdesk_plugins()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gcdesk-plugins"));
}

/// Test that providing no subcommand shows an error.
#[test]
fn test_no_subcommand_shows_error() {
    gcdesk_plugins().assert().failure();
}

#[test]
fn test_list_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");

    gcdesk_plugins()
        .arg("list")
        .arg("--dir")
        .arg(&plugins)
        .assert()
        .success()
        .stdout(predicate::str::contains("No plug-ins found"))
        .stdout(predicate::str::contains("0 plug-in(s): 0 active"));
}

#[test]
fn test_list_json_output() {
    let dir = tempfile::tempdir().unwrap();

    let output = gcdesk_plugins()
        .args(["list", "--json", "--host-version", "3.2.1", "--dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let registry: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(registry["plugins"], serde_json::json!([]));
    assert_eq!(registry["api_version"], "1.0");
    assert_eq!(registry["host_version"], "3.2.1");
}

#[test]
fn test_list_reports_broken_bundle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(native_name("broken")), b"not a library").unwrap();

    gcdesk_plugins()
        .arg("list")
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains(native_name("broken")))
        .stdout(predicate::str::contains("Unable to create isolation context for plug-in"));
}

#[test]
fn test_check_fails_on_broken_bundle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(native_name("broken")), b"not a library").unwrap();

    gcdesk_plugins()
        .arg("check")
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Registered 0 aggregation(s)"));
}

#[test]
fn test_check_succeeds_on_empty_directory() {
    let dir = tempfile::tempdir().unwrap();

    let output = gcdesk_plugins()
        .args(["check", "--json", "--dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["registered_aggregations"], serde_json::json!({}));
    assert_eq!(report["registry"]["plugins"], serde_json::json!([]));
}

#[test]
fn test_config_file_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("bundles");
    std::fs::create_dir(&plugins).unwrap();
    std::fs::write(plugins.join(native_name("broken")), b"not a library").unwrap();

    let config = dir.path().join("gcdesk.toml");
    std::fs::write(
        &config,
        format!(
            "directory = {:?}\nhost_version = \"3.2.1\"\n",
            plugins.display().to_string()
        ),
    )
    .unwrap();

    gcdesk_plugins()
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(native_name("broken")))
        .stdout(predicate::str::contains("host 3.2.1"));
}

#[test]
fn test_env_overrides_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(native_name("broken")), b"not a library").unwrap();

    gcdesk_plugins()
        .env("GCDESK_PLUGIN_DIR", dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 plug-in(s)"));
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("gcdesk.toml");
    std::fs::write(&config, "unknown_host_version = \"sometimes\"\n").unwrap();

    gcdesk_plugins()
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load configuration"));
}
