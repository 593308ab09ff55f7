use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const SYSTEM: &str = r#"
routing:
  balancing_type: day
timepoints:
  - { id: 1, hours: 12 }
  - { id: 2, hours: 12 }
horizons:
  - { balancing_type: day, horizon: 1, boundary: linear, timepoints: [1, 2] }
nodes:
  - { name: dam, reservoir: true, initial_storage: 1000 }
  - { name: town }
links:
  - { name: river, from: dam, to: town, travel_time: 12, max_flow: 40 }
"#;

fn write_spec(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("system.yaml");
    fs::write(&path, text).unwrap();
    path
}

fn cascade() -> Command {
    Command::cargo_bin("cascade").unwrap()
}

#[test]
fn inspect_prints_network_and_horizons() {
    let dir = tempdir().unwrap();
    let spec = write_spec(dir.path(), SYSTEM);
    cascade()
        .args(["inspect", spec.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 nodes (1 reservoirs), 1 links"))
        .stdout(predicate::str::contains("linear"));
}

#[test]
fn inspect_json_counts_timepoints() {
    let dir = tempdir().unwrap();
    let spec = write_spec(dir.path(), SYSTEM);
    let output = cascade()
        .args(["inspect", spec.to_str().unwrap(), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["timepoints"], 2);
    assert_eq!(summary["horizons"][0]["hours"], 24.0);
}

#[test]
fn validate_accepts_clean_system() {
    let dir = tempdir().unwrap();
    let spec = write_spec(dir.path(), SYSTEM);
    cascade()
        .args(["validate", spec.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues"));
}

#[test]
fn validate_fails_on_missing_routing_horizons() {
    let dir = tempdir().unwrap();
    let spec = write_spec(dir.path(), &SYSTEM.replace("balancing_type: day\ntimepoints", "balancing_type: week\ntimepoints"));
    cascade()
        .args(["validate", spec.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed validation"));
}

#[test]
fn route_writes_report() {
    let dir = tempdir().unwrap();
    let spec = write_spec(dir.path(), SYSTEM);
    let out = dir.path().join("reports").join("routes.json");
    cascade()
        .args(["route", spec.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Routing report written"));

    let report: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["links"][0]["routes"][0]["arrival"], 2);
    assert_eq!(report["links"][0]["routes"][1]["arrival"], Value::Null);
    assert_eq!(report["constraint_counts"]["flow_bounds"], 2);
}

#[test]
fn route_reports_malformed_boundary() {
    let dir = tempdir().unwrap();
    let spec = write_spec(dir.path(), &SYSTEM.replace("boundary: linear", "boundary: spiral"));
    cascade()
        .args(["route", spec.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed boundary type 'spiral'"));
}
