//! Corruption recovery tests for the limber binary.
//!
//! These tests verify the system can handle:
//! - Malformed history lines
//! - Partial writes at the end of the history file
//! - Broken catalog and config files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::PathBuf;
use tempfile::TempDir;

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("limber"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env("TZ", "UTC")
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"));
    cmd
}

fn setup_with_catalog() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    cli(&temp_dir).arg("init").assert().success();
    let data_dir = temp_dir.path().join("data");
    (temp_dir, data_dir)
}

#[test]
fn test_malformed_history_lines_are_skipped() {
    let (temp_dir, data_dir) = setup_with_catalog();

    let mut file = fs::File::create(data_dir.join("history.jsonl")).unwrap();
    writeln!(file, "{{ invalid json }}").unwrap();
    writeln!(
        file,
        r#"{{"item":"Chin Tucks (neck)","ordinal":1,"durationSeconds":55,"timestamp":"2024-03-03T08:00:00Z"}}"#
    )
    .unwrap();
    writeln!(file, r#"{{"item":"Chin Tucks (neck)","ordinal":2}}"#).unwrap();
    drop(file);

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 entries"));
}

#[test]
fn test_partial_history_line() {
    let (temp_dir, data_dir) = setup_with_catalog();
    let history_path = data_dir.join("history.jsonl");

    // Simulate a crash during write: valid line, then a partial one
    let mut file = fs::File::create(&history_path).unwrap();
    writeln!(
        file,
        r#"{{"item":"Chin Tucks (neck)","ordinal":1,"durationSeconds":55,"timestamp":"2024-03-03T08:00:00Z"}}"#
    )
    .unwrap();
    write!(file, r#"{{"item":"Chin Tu"#).unwrap();
    drop(file);

    cli(&temp_dir)
        .args([
            "log",
            "Chin Tucks (neck)",
            "1",
            "--seconds",
            "60",
            "--at",
            "2024-03-04T08:00:00Z",
        ])
        .assert()
        .success();

    // The new entry starts on its own line and is readable
    let output = cli(&temp_dir).args(["history", "--csv"]).output().unwrap();
    assert!(output.status.success());
    let csv = String::from_utf8(output.stdout).unwrap();
    assert!(csv.contains("Chin Tucks (neck),1,60,,,2024-03-04T08:00:00Z"));
    assert!(csv.contains("Chin Tucks (neck),1,55,,,2024-03-03T08:00:00Z"));
}

#[test]
fn test_empty_history_file() {
    let (temp_dir, data_dir) = setup_with_catalog();
    fs::write(data_dir.join("history.jsonl"), "").unwrap();

    cli(&temp_dir)
        .args(["session", "--date", "2024-03-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 of"));
}

#[test]
fn test_corrupted_catalog_blocks_session() {
    let (temp_dir, data_dir) = setup_with_catalog();
    fs::write(data_dir.join("stretches.yaml"), "items: [[[").unwrap();

    cli(&temp_dir).arg("session").assert().failure();

    // History stays readable without a catalog
    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No history yet."));
}

#[test]
fn test_catalog_fixed_after_error() {
    let (temp_dir, data_dir) = setup_with_catalog();
    let catalog_path = data_dir.join("stretches.yaml");
    let good = fs::read_to_string(&catalog_path).unwrap();

    fs::write(&catalog_path, "regimens: {}\n").unwrap();
    cli(&temp_dir).arg("check").assert().failure();

    fs::write(&catalog_path, good).unwrap();
    cli(&temp_dir).arg("check").assert().success();
}

#[test]
fn test_corrupted_config_file() {
    let (temp_dir, _) = setup_with_catalog();
    let config_dir = temp_dir.path().join("config/limber");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[session\ndefault_regimen = ").unwrap();

    cli(&temp_dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Toml"));
}
