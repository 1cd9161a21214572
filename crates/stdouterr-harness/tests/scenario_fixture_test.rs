//! Integration test: shipped redirection scenario fixtures
//!
//! Validates that:
//! 1. Every fixture under tests/scenarios/ loads and carries the current version.
//! 2. The shipped redirection-order set matches the builtin set.
//! 3. Every fixture scenario passes against the model.
//! 4. A logged model run produces a schema-valid JSONL log.
//!
//! Run: cargo test -p stdouterr-harness --test scenario_fixture_test

use std::path::{Path, PathBuf};

use stdouterr_harness::scenario::SCENARIO_SET_VERSION;
use stdouterr_harness::structured_log::{LogEmitter, validate_log_file};
use stdouterr_harness::{CheckMode, ScenarioReport, ScenarioRunner, ScenarioSet, VerificationSummary};

fn workspace_root() -> PathBuf {
    let manifest = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest)
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn scenarios_dir() -> PathBuf {
    workspace_root().join("tests/scenarios")
}

#[test]
fn fixtures_load_with_current_version() {
    let sets = ScenarioSet::from_dir(&scenarios_dir()).expect("scenario fixtures should load");
    assert!(!sets.is_empty(), "no fixtures in tests/scenarios");
    for set in &sets {
        assert_eq!(set.version, SCENARIO_SET_VERSION, "{}", set.title);
        assert!(!set.scenarios.is_empty(), "{} has no scenarios", set.title);
    }
}

#[test]
fn redirection_order_fixture_matches_builtin() {
    let path = scenarios_dir().join("redirection_order.v1.json");
    let shipped = ScenarioSet::from_file(&path).expect("redirection_order.v1.json should exist");
    assert_eq!(shipped, ScenarioSet::builtin());
}

#[test]
fn fixtures_pass_against_model() {
    let runner = ScenarioRunner::new(CheckMode::Model);
    let mut results = Vec::new();
    for set in ScenarioSet::from_dir(&scenarios_dir()).unwrap() {
        results.extend(runner.run(&set).unwrap());
    }
    let summary = VerificationSummary::from_results(results);
    let report = ScenarioReport {
        title: String::from("fixture model check"),
        check: String::from("model"),
        timestamp: String::from("2026-01-01T00:00:00.000Z"),
        summary,
    };
    assert!(report.summary.all_passed(), "{}", report.to_markdown());
}

#[test]
fn logged_fixture_run_validates() {
    let dir = workspace_root().join("target/stdouterr-harness-tests");
    std::fs::create_dir_all(&dir).unwrap();
    let log_path = dir.join("fixture_model.jsonl");

    let set = ScenarioSet::from_file(&scenarios_dir().join("redirection_order.v1.json")).unwrap();
    let mut log = LogEmitter::to_file(&log_path, "scenarios", "fixture").unwrap();
    let results = ScenarioRunner::new(CheckMode::Model)
        .run_logged(&set, &mut log)
        .unwrap();
    log.flush().unwrap();
    drop(log);

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(lines, results.len());
    assert!(errors.is_empty(), "log errors: {errors:?}");

    let content = std::fs::read_to_string(&log_path).unwrap();
    let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(first["trace_id"], "scenarios::fixture::001");
    assert_eq!(first["scenario"], "no-redirect");
    assert_eq!(first["check"], "model");
    assert_eq!(first["outcome"], "pass");
}
