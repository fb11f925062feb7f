#![warn(clippy::pedantic)]

//! Integration tests for the clientbin CLI.
//!
//! These tests spawn the compiled `clientbin` executable and validate its
//! behavior through stdout, stderr and exit codes.
//!
//! ## Test Strategy
//!
//! 1. **Help**: subcommands are listed
//! 2. **Catalog loading**: missing and malformed catalogs fail cleanly
//! 3. **Scan**: records are printed as JSON
//! 4. **Download**: early pipeline failures surface their messages
//! 5. **List**: supported clients are shown
//!
//! No test touches the network. Every test uses its own temporary directory
//! and sets `CLIENTBIN_HOME` so nothing is written outside it.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use clientbin::Platform;
use predicates::prelude::*;
use std::process::Command;

/// Catalog with one client for the host platform.
fn host_catalog(config: &serde_json::Value) -> String {
    let platform = Platform::current();
    serde_json::json!({
        "clients": {
            "Maga": {
                "version": "1.0.0",
                "platforms": { platform.os(): { platform.arch(): config } }
            }
        }
    })
    .to_string()
}

fn clientbin(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("clientbin"));
    cmd.env("CLIENTBIN_HOME", temp.path())
        .env_remove("CLIENTBIN_CATALOG")
        .env_remove("RUST_LOG");
    cmd
}

// -----------------------------------------------------------------------------
// Help
// -----------------------------------------------------------------------------

/// Verifies that `clientbin --help` lists every subcommand.
#[test]
fn help_shows_available_commands() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("clientbin"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("CLIENTBIN_CATALOG"));
}

// -----------------------------------------------------------------------------
// Catalog Loading
// -----------------------------------------------------------------------------

/// Verifies that a command without any catalog fails with guidance.
#[test]
fn missing_catalog_argument_fails() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("scan");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no catalog given"));
}

/// Verifies that a malformed catalog is reported with its path.
#[test]
fn malformed_catalog_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog.write_str("{ not json").unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog").arg(catalog.path()).arg("scan");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot load catalog"))
        .stderr(predicate::str::contains("invalid catalog document"));
}

/// Verifies that `CLIENTBIN_CATALOG` stands in for `--catalog`.
#[test]
fn catalog_can_come_from_environment() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog.write_str(r#"{ "clients": {} }"#).unwrap();

    let mut cmd = clientbin(&temp);
    cmd.env("CLIENTBIN_CATALOG", catalog.path()).arg("scan");

    cmd.assert().success().stdout(predicate::str::contains("{}"));
}

// -----------------------------------------------------------------------------
// Scan Command
// -----------------------------------------------------------------------------

/// Verifies that an empty catalog scans to an empty JSON object.
#[test]
fn scan_empty_catalog_prints_empty_object() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog.write_str(r#"{ "clients": {} }"#).unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog").arg(catalog.path()).arg("scan");

    cmd.assert().success().stdout(predicate::eq("{}\n"));
}

/// Verifies that a client absent from the host is reported as `notFound`.
#[test]
fn scan_reports_missing_client() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog
        .write_str(&host_catalog(&serde_json::json!({
            "bin": "clientbin-cli-test-missing",
            "commands": { "sanity": { "args": ["test"], "output": ["good:test"] } }
        })))
        .unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog")
        .arg(catalog.path())
        .arg("scan")
        .arg("--folder")
        .arg(temp.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"Maga\""))
        .stdout(predicate::str::contains("\"failReason\": \"notFound\""));
}

/// Verifies that a client found in an extra folder is reported as available.
#[cfg(unix)]
#[test]
fn scan_finds_client_in_extra_folder() {
    use std::os::unix::fs::PermissionsExt;

    let temp = assert_fs::TempDir::new().unwrap();
    let tools = temp.child("tools");
    let script = tools.child("clientbin-cli-test-maga");
    script
        .write_str("#!/bin/sh\necho \"good:$1\"\n")
        .unwrap();
    std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

    let catalog = temp.child("clients.json");
    catalog
        .write_str(&host_catalog(&serde_json::json!({
            "bin": "clientbin-cli-test-maga",
            "commands": { "sanity": { "args": ["test"], "output": ["good:test"] } }
        })))
        .unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog")
        .arg(catalog.path())
        .arg("scan")
        .arg("--folder")
        .arg(tools.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"available\": true"))
        .stdout(predicate::str::contains("clientbin-cli-test-maga"));
}

// -----------------------------------------------------------------------------
// Download Command
// -----------------------------------------------------------------------------

/// Verifies that downloading an unknown client fails with its id.
#[test]
fn download_unknown_client_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog.write_str(r#"{ "clients": {} }"#).unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog")
        .arg(catalog.path())
        .arg("download")
        .arg("Geth");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "Geth missing configuration for this platform.",
        ));
}

/// Verifies that a client without download info cannot be downloaded.
#[test]
fn download_without_descriptor_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog
        .write_str(&host_catalog(&serde_json::json!({ "bin": "clientbin-cli-test-missing" })))
        .unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog")
        .arg(catalog.path())
        .arg("download")
        .arg("Maga");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Download info not available for Maga"));
}

/// Verifies that `--url-pattern` rejects non-matching URLs before any fetch.
#[test]
fn download_url_pattern_mismatch_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog
        .write_str(&host_catalog(&serde_json::json!({
            "bin": "clientbin-cli-test-missing",
            "download": { "url": "http://localhost/maga.zip", "type": "zip" }
        })))
        .unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog")
        .arg(catalog.path())
        .arg("download")
        .arg("Maga")
        .arg("--url-pattern")
        .arg("^https://");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Download URL failed regex check"));
    temp.child("Maga").assert(predicate::path::missing());
}

/// Verifies that an invalid `--url-pattern` is reported as such.
#[test]
fn download_invalid_url_pattern_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog.write_str(r#"{ "clients": {} }"#).unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog")
        .arg(catalog.path())
        .arg("download")
        .arg("Maga")
        .arg("--url-pattern")
        .arg("(");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL pattern"));
}

// -----------------------------------------------------------------------------
// List Command
// -----------------------------------------------------------------------------

/// Verifies that `clientbin list` handles a catalog with nothing for this host.
#[test]
fn list_empty_catalog_shows_message() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog.write_str(r#"{ "clients": {} }"#).unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog").arg(catalog.path()).arg("list");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No clients supported on"));
}

/// Verifies that `clientbin list` marks downloadable clients.
#[test]
fn list_shows_downloadable_clients() {
    let temp = assert_fs::TempDir::new().unwrap();
    let catalog = temp.child("clients.json");
    catalog
        .write_str(&host_catalog(&serde_json::json!({
            "bin": "maga",
            "download": { "url": "http://localhost/maga.zip", "type": "zip" }
        })))
        .unwrap();

    let mut cmd = clientbin(&temp);
    cmd.arg("--catalog").arg(catalog.path()).arg("list");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Maga"))
        .stdout(predicate::str::contains("(downloadable)"));
}
