//! Integration tests for the `buildwatch` CLI binary.
//!
//! These cover argument parsing, help output, shell completions, config
//! management, and offline replay, all against temporary files.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `buildwatch` binary with env isolation.
///
/// Clears `BUILDWATCH_*` overrides and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn buildwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("buildwatch");
    cmd.env("HOME", "/tmp/buildwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/buildwatch-cli-test-nonexistent")
        .env_remove("BUILDWATCH_CONFIG")
        .env_remove("BUILDWATCH_OUTPUT")
        .env_remove("BUILDWATCH_ENGINE__REMINDER_MS")
        .env_remove("BUILDWATCH_ENGINE__PURGE_RETENTION_MS")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_requests(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("requests.jsonl");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

const BREAK_THEN_MORE: &[&str] = &[
    r#"{"op":"event","build":"bolt","job":"smoke","kind":"broken","timestamp":1000,"responsible":["alice"]}"#,
    r#"{"op":"event","build":"bolt","job":"smoke","kind":"broken","timestamp":2000,"responsible":["bob"]}"#,
    r#"{"op":"event","build":"bolt","job":"unit","kind":"fixed","timestamp":1500}"#,
    r#"{"op":"event","build":"nut","job":"lint","kind":"broken","timestamp":1000}"#,
    r#"{"op":"event","build":"nut","job":"lint","kind":"fixed","timestamp":3000}"#,
];

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = buildwatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    buildwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("build health")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("replay"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    buildwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("buildwatch"));
}

#[test]
fn test_invalid_subcommand() {
    let output = buildwatch_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_requests(dir.path(), BREAK_THEN_MORE);
    let output = buildwatch_cmd()
        .args(["--output", "invalid", "replay"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    buildwatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    buildwatch_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Replay ──────────────────────────────────────────────────────────

#[test]
fn test_replay_json_reports_final_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_requests(dir.path(), BREAK_THEN_MORE);

    let output = buildwatch_cmd()
        .args(["-o", "json", "replay"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let tree: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let smoke = &tree["builds"]["bolt"]["jobs"]["smoke"];
    assert_eq!(smoke["last_break"]["timestamp"], 2000);
    assert_eq!(
        smoke["last_break"]["responsible"],
        serde_json::json!(["alice", "bob"])
    );
    assert_eq!(tree["builds"]["nut"]["jobs"]["lint"]["last_fix"]["timestamp"], 3000);
}

#[test]
fn test_replay_plain_lists_job_states() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_requests(dir.path(), BREAK_THEN_MORE);

    buildwatch_cmd()
        .args(["-o", "plain", "replay"])
        .arg(&input)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("bolt/smoke\tbroken")
                .and(predicate::str::contains("bolt/unit\tfixed"))
                .and(predicate::str::contains("nut/lint\tfixed")),
        );
}

#[test]
fn test_replay_table_shows_responsible() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_requests(dir.path(), BREAK_THEN_MORE);

    buildwatch_cmd()
        .args(["--color", "never", "replay"])
        .arg(&input)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Responsible")
                .and(predicate::str::contains("alice, bob"))
                .and(predicate::str::contains("broken")),
        );
}

#[test]
fn test_replay_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_requests(
        dir.path(),
        &[
            "this is not json",
            r#"{"op":"event","build":"bolt","job":"smoke","kind":"broken","timestamp":1}"#,
            r#"{"op":"clear","job":"smoke"}"#,
        ],
    );

    buildwatch_cmd()
        .args(["-o", "plain", "-v", "replay"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("bolt/smoke\tbroken"))
        .stderr(predicate::str::contains("skipping request"));
}

#[test]
fn test_replay_clear_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_requests(
        dir.path(),
        &[
            BREAK_THEN_MORE[0],
            BREAK_THEN_MORE[3],
            r#"{"op":"clear","build":"bolt"}"#,
            r#"{"op":"delete","build":"nut"}"#,
        ],
    );

    buildwatch_cmd()
        .args(["-o", "plain", "replay"])
        .arg(&input)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("bolt/smoke\tunknown")
                .and(predicate::str::contains("nut").not()),
        );
}

#[test]
fn test_replay_status_prints_intermediate_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_requests(
        dir.path(),
        &[
            BREAK_THEN_MORE[0],
            r#"{"op":"status"}"#,
            r#"{"op":"delete"}"#,
        ],
    );

    buildwatch_cmd()
        .args(["replay"])
        .arg(&input)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("smoke").and(predicate::str::contains("No builds tracked.")),
        );
}

#[test]
fn test_replay_missing_file() {
    let output = buildwatch_cmd()
        .args(["replay", "/tmp/buildwatch-cli-test-nonexistent/requests.jsonl"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("Cannot read"), "{text}");
}

// ── Run ─────────────────────────────────────────────────────────────

#[test]
fn test_run_until_eof_with_status() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[alerters]\nlog = false\n").unwrap();
    let input = write_requests(dir.path(), &[BREAK_THEN_MORE[0], r#"{"op":"status"}"#]);

    buildwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["-o", "plain", "run", "--reminder-ms", "0", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("bolt/smoke\tbroken"));
}

#[test]
fn test_run_reads_stdin() {
    buildwatch_cmd()
        .args(["-o", "plain", "run"])
        .write_stdin(format!("{}\n{{\"op\":\"status\"}}\n", BREAK_THEN_MORE[2]))
        .assert()
        .success()
        .stdout(predicate::str::contains("bolt/unit\tfixed"));
}

#[test]
fn test_run_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[engine]\npurge_delay_ms = 0\n").unwrap();

    let output = buildwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .write_stdin("")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("purge_delay_ms"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    // `config show` falls back to defaults when no file exists.
    buildwatch_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reminder_ms = 0"));
}

#[test]
fn test_config_show_json_reflects_env() {
    let output = buildwatch_cmd()
        .env("BUILDWATCH_ENGINE__REMINDER_MS", "60000")
        .args(["-o", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let cfg: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(cfg["engine"]["reminder_ms"], 60000);
    assert_eq!(cfg["alerters"]["log"], true);
}

#[test]
fn test_config_path_honors_flag() {
    buildwatch_cmd()
        .args(["--config", "/etc/buildwatch/custom.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/buildwatch/custom.toml"));
}

#[test]
fn test_config_init_writes_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("nested").join("config.toml");

    buildwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("[engine]"));
    assert!(written.contains("shutdown_timeout_ms = 3000"));

    let output = buildwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("already exists"));

    buildwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}
