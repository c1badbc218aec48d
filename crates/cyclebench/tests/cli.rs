//! Integration tests for the cyclebench binary

use std::net::TcpListener;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

/// Write a fast suite file into a fresh directory
fn suite(extra: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let log = dir.path().join("bench.xml");
    let content = format!(
        r#"
[main]
title = "smoke"
log_xml = "{}"

[bench]
cycles = [1, 2]
duration = 0.2
startup_delay = 0.01
cycle_time = 0
sleep_time = 0.001

[pass]
description = "Always passes"
{}
"#,
        log.display().to_string().replace('\\', "\\\\"),
        extra
    );
    let path = dir.path().join("suite.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

fn cyclebench() -> Command {
    let mut cmd = Command::cargo_bin("cyclebench").unwrap();
    cmd.env_remove("RUST_LOG").arg("--no-color");
    cmd
}

fn log_of(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("bench.xml")).unwrap()
}

#[test]
fn test_passing_run_exits_zero() {
    let (dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("Noop.pass")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bench status: SUCCESSFUL"));

    let xml = log_of(dir.path());
    assert_eq!(xml.matches("<cycle ").count(), 2);
    assert!(xml.contains("<config key=\"description\" value=\"Always passes\"/>"));
    assert!(xml.trim_end().ends_with("</cyclebench>"));
}

#[test]
fn test_failing_run_exits_one() {
    let (_dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("Noop.fail")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Bench status: FAILURE"));
}

#[test]
fn test_faulting_run_reports_error() {
    let (_dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("Noop.fault")
        .assert()
        .failure()
        .code(predicate::ne(1))
        .stdout(predicate::str::contains("Bench status: ERROR"));
}

#[test]
fn test_cycles_override() {
    let (dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("Noop.pass")
        .args(["-c", "3", "-D", "0.1"])
        .assert()
        .success();

    let xml = log_of(dir.path());
    assert_eq!(xml.matches("<cycle ").count(), 1);
    assert!(xml.contains("cvus=\"3\""));
}

#[test]
fn test_json_report() {
    let (dir, config) = suite("");
    let report = dir.path().join("report.json");

    cyclebench()
        .arg(&config)
        .arg("Noop.pass")
        .arg("--json-report")
        .arg(&report)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["test_id"], "pass");
    assert_eq!(json["status"], "SUCCESSFUL");
    assert_eq!(json["cycles"].as_array().unwrap().len(), 2);
}

#[test]
fn test_unreachable_monitor_is_not_fatal() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let (dir, config) = suite(&format!(
        "\n[monitor]\nhosts = [\"127.0.0.1\"]\ntimeout = 1\n\n[\"127.0.0.1\"]\nport = {}\ndescription = \"gone\"\n",
        port
    ));

    cyclebench()
        .arg(&config)
        .arg("Noop.pass")
        .assert()
        .success();

    let xml = log_of(dir.path());
    assert_eq!(xml.matches("<cycle ").count(), 2);
    assert!(!xml.contains("<monitor"));
}

#[test]
fn test_unknown_workload() {
    let (_dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("Nope.run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown workload 'Nope.run'"));
}

#[test]
fn test_malformed_workload_name() {
    let (_dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("pass")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("<Class>.<method>"));
}

#[test]
fn test_missing_config_file() {
    cyclebench()
        .arg("/nonexistent/suite.toml")
        .arg("Noop.pass")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_invalid_sleep_bounds() {
    let (_dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("Noop.pass")
        .args(["-m", "2", "-M", "1"])
        .assert()
        .code(2);
}

#[test]
fn test_http_get_without_url() {
    let (_dir, config) = suite("");

    cyclebench()
        .arg(&config)
        .arg("Http.get")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no URL to bench"));
}
