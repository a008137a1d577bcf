//! # CLI Command Tests
//!
//! Runs the `gapi` binary. The end-to-end case points every Google endpoint, token
//! exchange included, at a local mock server.

use assert_cmd::prelude::*;
use httpmock::{Method, MockServer};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn gapi() -> Command {
    let mut cmd = Command::cargo_bin("gapi").unwrap();
    cmd.env_remove("GAPI_CONFIG").env_remove("GAPI_CREDENTIALS");
    cmd
}

/// Copies the test key, redirecting its token exchange to `token_uri`.
fn write_credentials(dir: &Path, token_uri: &str) -> PathBuf {
    let fixture =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../lib/tests/data/service_account.json");
    let mut key: Value = serde_json::from_str(&fs::read_to_string(fixture).unwrap()).unwrap();
    key["token_uri"] = json!(token_uri);
    let path = dir.join("key.json");
    fs::write(&path, key.to_string()).unwrap();
    path
}

fn write_config(dir: &Path, credentials: &Path, base_url: &str) -> PathBuf {
    let path = dir.join("gapi.yml");
    let content = format!(
        "credentials: {}\n\
         retry:\n  delay_secs: 0.0\n  max_failures: 1\n  backoff: 1.0\n\
         endpoints:\n  sheets_api: {base_url}\n  docs: {base_url}\n  drive_api: {base_url}\n\
         \x20 drive_upload: {base_url}/upload\n  gmail_api: {base_url}\n",
        credentials.display()
    );
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_lists_the_commands() {
    gapi()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transfer-csv"))
        .stdout(predicate::str::contains("list-owned"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp_dir = tempdir().unwrap();

    gapi()
        .arg("--config")
        .arg(temp_dir.path().join("absent.yml"))
        .arg("list-owned")
        .arg("me@example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_missing_credentials_file_fails() {
    let temp_dir = tempdir().unwrap();

    gapi()
        .arg("--credentials")
        .arg(temp_dir.path().join("absent.json"))
        .arg("list-owned")
        .arg("me@example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.json"));
}

#[test]
fn test_transfer_csv_dry_run_reads_metadata_only() {
    // Arrange
    let server = MockServer::start();
    let token_mock = server.mock(|when, then| {
        when.method(Method::POST).path("/token");
        then.status(200)
            .json_body(json!({"access_token": "cli-token", "expires_in": 3600}));
    });
    let metadata_mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/spreadsheets/sid")
            .header("authorization", "Bearer cli-token");
        then.status(200).json_body(json!({
            "properties": {"title": "Report"},
            "sheets": [{"properties": {"sheetId": 3, "title": "Data"}}]
        }));
    });
    let write_mock = server.mock(|when, then| {
        when.method(Method::POST).path_contains("/spreadsheets/sid");
        then.status(200).json_body(json!({}));
    });

    let temp_dir = tempdir().unwrap();
    let credentials = write_credentials(temp_dir.path(), &server.url("/token"));
    let config = write_config(temp_dir.path(), &credentials, &server.base_url());
    let csv = temp_dir.path().join("data.csv");
    fs::write(&csv, "a;b\n1;2\n").unwrap();

    // Act
    let mut cmd = gapi();
    cmd.arg("--config")
        .arg(&config)
        .arg("transfer-csv")
        .arg(&csv)
        .arg("sid")
        .arg("Data")
        .arg("--delimiter")
        .arg(";")
        .arg("--dry-run");

    // Assert
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 destination(s) written"));
    token_mock.assert();
    metadata_mock.assert();
    write_mock.assert_hits(0);
}
