//! End-to-end tests for the handoff binary
//!
//! These tests validate:
//! - Configuration file loading and validation errors
//! - Command-line overrides
//! - The `--check` mode
//! - A full run against a mock file store and ETL server

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

/// Command isolated from the caller's environment and working directory
fn handoff(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("handoff").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("HANDOFF_STORE_USERNAME")
        .env_remove("HANDOFF_STORE_PASSWORD")
        .env_remove("HANDOFF_JDBC_PASSWORD")
        .env_remove("HANDOFF_LOG_LEVEL")
        .env_remove("HANDOFF_LOG_OUTPUT");
    cmd
}

fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();

    handoff(&dir)
        .arg("does-not-exist.toml")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Cannot read configuration file"));
}

#[test]
fn test_missing_credentials_reported_per_key() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "agent.toml", "[etl]\ngraph = \"graph/load.grf\"\n");

    handoff(&dir)
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("store.username is a mandatory property"))
        .stderr(predicate::str::contains("store.password is a mandatory property"))
        .stderr(predicate::str::contains("etl.process_url"));
}

#[test]
fn test_both_packaging_templates_rejected() {
    let dir = TempDir::new().unwrap();

    handoff(&dir)
        .args(["--store-username", "agent", "--store-password", "pw"])
        .args(["-D", "store.upload_archive=a.zip", "-D", "store.upload_manifest=m.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Only one of"));
}

#[test]
fn test_check_prints_summary_without_secrets() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "agent.yml",
        "store:\n  username: agent\n  password: s3cr3t\n  upload_url: https://dav.example.com/in\n  upload_archive: data-${yyyyMMdd}.zip\n",
    );

    handoff(&dir)
        .arg(&config)
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("https://dav.example.com/in"))
        .stdout(predicate::str::contains("s3cr3t").not());
}

#[test]
fn test_default_config_file_picked_up() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "handoff.toml",
        "[store]\nusername = \"from-file\"\npassword = \"pw\"\n",
    );

    handoff(&dir)
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("from-file"));
}

#[test]
fn test_password_from_environment() {
    let dir = TempDir::new().unwrap();

    handoff(&dir)
        .args(["--store-username", "agent", "--check"])
        .env("HANDOFF_STORE_PASSWORD", "pw")
        .assert()
        .success();
}

// ============================================================================
// Run Tests
// ============================================================================

#[test]
fn test_nothing_configured_skips_every_step() {
    let dir = TempDir::new().unwrap();

    handoff(&dir)
        .args(["--store-username", "agent", "--store-password", "pw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: Upload URL is not set up, skipping"))
        .stdout(predicate::str::contains("OK: ETL not set up, skipping"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_run_uploads_manifest_and_triggers_job() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/dav/in/.+\.\d+$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("MOVE"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/etl/process/7/executions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "executionTask": {"links": {"log": "/etl/process/7/executions/1/log"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir(&input).unwrap();
    std::fs::write(input.join("orders.csv"), "id\n1\n").unwrap();
    std::fs::write(input.join("notes.txt"), "ignored").unwrap();

    let config = write_config(
        &dir,
        "agent.properties",
        &format!(
            "store.username=agent\n\
             store.password=pw\n\
             store.upload_url={uri}/dav/in\n\
             store.upload_manifest=manifest-${{yyyyMMdd}}.txt\n\
             etl.process_url={uri}/etl/process/7\n\
             etl.graph=graph/load.grf\n\
             filesystem.input_dir={input}\n\
             filesystem.wildcard=*.csv\n",
            uri = server.uri(),
            input = input.display()
        ),
    );

    let output = handoff(&dir).arg(&config).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("2 file(s) uploaded"));
    assert!(stdout.contains("/etl/process/7/executions/1/log"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_upload_exits_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("orders.csv"), "id\n1\n").unwrap();
    let upload_url = format!("store.upload_url={}/dav/in", server.uri());
    let input_dir = format!("filesystem.input_dir={}", dir.path().display());

    handoff(&dir)
        .args(["--store-username", "agent", "--store-password", "pw"])
        .args(["-D", &upload_url, "-D", "store.upload_archive=data.zip", "-D", &input_dir])
        .args(["-D", "filesystem.wildcard=*.csv"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("403"));
}
