use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn netops() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netops"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write_pair(left: &str, right: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let a = dir.path().join("before.cfg");
    let b = dir.path().join("after.cfg");
    fs::write(&a, left).expect("write left");
    fs::write(&b, right).expect("write right");
    (dir, a, b)
}

#[test]
fn diff_prints_unified_hunks_and_summary() {
    let (_dir, a, b) = write_pair(
        "hostname core1\ninterface Vlan10\n ip address 10.0.10.2 255.255.255.0\n",
        "hostname core1\ninterface Vlan10\n ip address 10.0.10.3 255.255.255.0\n",
    );
    netops()
        .arg("diff")
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("- ip address 10.0.10.2 255.255.255.0"))
        .stdout(predicate::str::contains("+ ip address 10.0.10.3 255.255.255.0"))
        .stdout(predicate::str::contains("unchanged=2 added=1 removed=1"));
}

#[test]
fn summary_only_omits_hunks() {
    let (_dir, a, b) = write_pair("a\nb\n", "a\nc\n");
    netops()
        .arg("diff")
        .arg(&a)
        .arg(&b)
        .arg("--summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("added=1 removed=1"))
        .stdout(predicate::str::contains("@@").not());
}

#[test]
fn comment_changes_can_be_ignored() {
    let (_dir, a, b) = write_pair(
        "! generated 2024-05-01\nhostname core1\n",
        "! generated 2024-06-01\nhostname core1\n",
    );
    netops()
        .arg("diff")
        .arg(&a)
        .arg(&b)
        .arg("--ignore-comments")
        .arg("--summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("added=0 removed=0"));
}

#[test]
fn json_lists_only_changed_entries() {
    let (_dir, a, b) = write_pair("same\nold\n", "same\nnew\n");
    let output = netops()
        .arg("diff")
        .arg(&a)
        .arg(&b)
        .arg("--format")
        .arg("json")
        .output()
        .expect("run netops");
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["stats"]["unchanged"], 1);
    let types: Vec<&str> = doc["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|e| e["type"].as_str())
        .collect();
    assert_eq!(types, vec!["removed", "added"]);
}

#[test]
fn missing_file_is_reported() {
    netops()
        .arg("diff")
        .arg("/nonexistent/a.cfg")
        .arg("/nonexistent/b.cfg")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
