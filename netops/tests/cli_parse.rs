use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn netops() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netops"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn detect_reports_each_dialect() {
    for (path, vendor) in [
        ("fixtures/mikrotik-edge.rsc", "vendor=mikrotik"),
        ("fixtures/cisco-core.cfg", "vendor=cisco"),
        ("fixtures/fortigate-fw.conf", "vendor=fortigate"),
    ] {
        netops()
            .arg("detect")
            .arg(fixture(path))
            .assert()
            .success()
            .stdout(predicate::str::contains(vendor))
            .stdout(predicate::str::contains("confidence=high"));
    }
}

#[test]
fn detect_fails_on_unknown_text() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("notes.txt");
    fs::write(&path, "shopping list\nmilk\n").expect("write");

    netops()
        .arg("detect")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("vendor=unknown"))
        .stderr(predicate::str::contains("no supported dialect"));
}

#[test]
fn parse_summarizes_mikrotik_fixture() {
    netops()
        .arg("parse")
        .arg(fixture("fixtures/mikrotik-edge.rsc"))
        .assert()
        .success()
        .stdout(predicate::str::contains("edge-rtr-1"))
        .stdout(predicate::str::contains("- os_version: 7.14.2"))
        .stdout(predicate::str::contains("- vlans: 2"))
        .stdout(predicate::str::contains("vlan10"));
}

#[test]
fn parse_json_emits_canonical_config() {
    let output = netops()
        .arg("parse")
        .arg(fixture("fixtures/cisco-core.cfg"))
        .arg("--format")
        .arg("json")
        .output()
        .expect("run netops");
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["normalized"]["device"]["vendor"], "cisco");
    assert_eq!(doc["normalized"]["device"]["hostname"], "core-sw-1");
    assert_eq!(doc["errors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn strict_parse_fails_on_malformed_lines() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.rsc");
    fs::write(
        &path,
        "/system identity\nset name=r1\n/ip address\nadd address=10.0.0.300/24 interface=ether1\n",
    )
    .expect("write");

    netops()
        .arg("parse")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("line 4"));

    netops()
        .arg("parse")
        .arg(&path)
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
fn explicit_vendor_skips_detection() {
    netops()
        .arg("parse")
        .arg(fixture("fixtures/fortigate-fw.conf"))
        .arg("--vendor")
        .arg("fortigate")
        .assert()
        .success()
        .stdout(predicate::str::contains("fw-branch-1"));
}
