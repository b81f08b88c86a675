//! End-to-end checks of the `nexus` binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn nexus(dir: &TempDir) -> Command {
    let mut command = cargo_bin_cmd!("nexus");
    command
        .env("NEXUS_SOCKET_DIR", dir.path())
        .env("NEXUS_AUTH_TOKEN_PATH", dir.path().join("token"))
        .env_remove("NEXUS_CONFIG_PATH");
    command
}

#[test]
fn help_lists_the_request_arguments() {
    let dir = tempfile::tempdir().expect("temp dir");
    nexus(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("METHOD").and(predicate::str::contains("--service")));
}

#[test]
fn missing_socket_reports_a_connect_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    nexus(&dir)
        .args(["GET", "/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("service_home.sock"));
}

#[test]
fn array_payloads_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    nexus(&dir)
        .args(["--data", "[1]", "POST", "/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[test]
fn socket_dir_flag_precedes_the_request() {
    let dir = tempfile::tempdir().expect("temp dir");
    let elsewhere = dir.path().join("elsewhere");
    nexus(&dir)
        .arg("--socket-dir")
        .arg(&elsewhere)
        .args(["GET", "/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("elsewhere"));
}
