//! CLI and basic command tests
//!
//! Drives the real binary. Network-facing cases run against a local mock
//! GraphQL server; nothing here talks to the actual RunPod API.

use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to get a runpod-cli command with a clean environment
fn runpod() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("runpod-cli"));
    cmd.env_remove("RUNPOD_API_KEY");
    cmd.env_remove("RUNPOD_GRAPHQL_URL");
    cmd
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    runpod()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manage RunPod GPU pods"));
}

#[test]
fn test_version_displays() {
    runpod()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.2"));
}

#[test]
fn test_unknown_command_fails() {
    runpod()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_stop_requires_a_pod_id() {
    runpod()
        .arg("stop")
        .assert()
        .failure()
        .stderr(predicate::str::contains("POD_ID"));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_missing_api_key_fails_before_any_request() {
    let tmp = TempDir::new().unwrap();

    runpod()
        .current_dir(tmp.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("api.api_key"));
}

#[test]
fn test_strict_mode_rejects_unknown_config_key() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("runpod.yaml");
    std::fs::write(&config_path, "machine:\n  quantum_bits: 7\n").unwrap();

    runpod()
        .current_dir(tmp.path())
        .args([
            "list",
            "--strict",
            "--config-file",
            config_path.to_str().unwrap(),
            "--api-key",
            "test-key",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("machine.quantum_bits"));
}

#[test]
fn test_unreadable_config_file_fails() {
    let tmp = TempDir::new().unwrap();

    runpod()
        .current_dir(tmp.path())
        .args([
            "list",
            "--config-file",
            "does-not-exist.yaml",
            "--api-key",
            "test-key",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read config file"));
}

// ============================================================================
// End-to-end Tests (mock server)
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_with_no_pods_prints_empty_table_with_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "myself": { "pods": [] } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let tmp = TempDir::new().unwrap();
    tokio::task::spawn_blocking(move || {
        // The key arrives via the environment here, the endpoint via flag.
        runpod()
            .current_dir(tmp.path())
            .env("RUNPOD_API_KEY", "test-key")
            .args(["list", "--api-url", &uri])
            .assert()
            .success()
            .stdout(predicate::str::contains("ID"))
            .stdout(predicate::str::contains("Status"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_with_invalid_pod_id_exits_nonzero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "pod not found" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let tmp = TempDir::new().unwrap();
    tokio::task::spawn_blocking(move || {
        runpod()
            .current_dir(tmp.path())
            .args(["start", "not-a-pod", "--api-url", &uri, "--api-key", "test-key"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("remote operation failed"))
            .stderr(predicate::str::contains("pod not found"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_api_url_flag_beats_config_file() {
    // The config file points at a server that must never be called; the
    // flag points at the one that answers.
    let flagged = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "myself": { "pods": [] } }
        })))
        .expect(1)
        .mount(&flagged)
        .await;

    let shadowed = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&shadowed)
        .await;

    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("runpod.yaml");
    std::fs::write(
        &config_path,
        format!("api:\n  url: {}\n  api_key: file-key\n", shadowed.uri()),
    )
    .unwrap();

    let uri = flagged.uri();
    tokio::task::spawn_blocking(move || {
        runpod()
            .current_dir(tmp.path())
            .args([
                "list",
                "--config-file",
                config_path.to_str().unwrap(),
                "--api-url",
                &uri,
            ])
            .assert()
            .success();
    })
    .await
    .unwrap();
}
