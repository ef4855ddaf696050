//! CLI end-to-end tests for mt-core.
//!
//! Each test writes a small event log to a temp dir, runs the binary, and
//! checks stdout payloads and exit codes.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the mt-core binary with an isolated config dir.
fn mt_core(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mt-core").expect("mt-core binary should exist");
    cmd.env("MOVEMENT_TRIAGE_CONFIG", config_home.path())
        .env_remove("RUST_LOG")
        .env_remove("MT_LOG")
        .env("MT_LOG_FORMAT", "human");
    cmd
}

/// Patient "a" is modelled and has one flagged day (2019-07-03);
/// patient "b" is degenerate.
const EVENTS: &str = "\
patient_id,timestamp,location_name,date
a,2019-07-01 08:00:00,Hall,2019-07-01
a,2019-07-01 08:01:00,Lounge,2019-07-01
a,2019-07-01 08:02:00,Hall,2019-07-01
a,2019-07-01 08:03:00,Lounge,2019-07-01
a,2019-07-01 08:04:00,Hall,2019-07-01
a,2019-07-03 08:00:00,Lounge,2019-07-03
a,2019-07-03 08:01:00,Hall,2019-07-03
a,2019-07-03 08:02:00,Kitchen,2019-07-03
b,2019-07-01 09:00:00,Hall,2019-07-01
b,2019-07-01 09:05:00,Lounge,2019-07-01
";

/// Only patient "a" with reciprocated moves: nothing flagged.
const CLEAN_EVENTS: &str = "\
patient_id,timestamp,location_name
a,2019-07-01 08:00:00,Hall
a,2019-07-01 08:01:00,Lounge
a,2019-07-01 08:02:00,Hall
";

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// analyze
// ============================================================================

mod analyze {
    use super::*;

    #[test]
    fn flagged_run_exits_one_with_csv_rows() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", EVENTS);

        mt_core(&dir)
            .args(["-f", "csv", "analyze"])
            .arg(&events)
            .assert()
            .code(1)
            .stdout(predicate::str::starts_with("patient_id,date,count\n"))
            .stdout(predicate::str::contains("a,2019-07-03,1"));
    }

    #[test]
    fn json_report_lists_degenerate_failure() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", EVENTS);

        let output = mt_core(&dir)
            .arg("analyze")
            .arg(&events)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));

        let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert!(v["run_id"].as_str().unwrap().starts_with("run-"));
        assert_eq!(v["summary"]["patients_total"], 2);
        assert_eq!(v["failures"][0]["item_id"], "b");
        assert_eq!(v["failures"][0]["error"]["code"], 31);
        assert_eq!(v["states"]["states"][0], "Hall");
        assert_eq!(v["flagged"]["a"][0]["date"], "2019-07-03");
    }

    #[test]
    fn occurrences_flag_suppresses_day() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", EVENTS);

        // Day count 1 is not > 1; only the degenerate patient remains.
        mt_core(&dir)
            .args(["-f", "summary", "analyze", "--occurrences", "1"])
            .arg(&events)
            .assert()
            .code(3)
            .stdout("2 patients: 0 flagged (0 days), 1 failed\n");
    }

    #[test]
    fn clean_run_exits_zero() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", CLEAN_EVENTS);

        mt_core(&dir)
            .args(["-f", "summary", "analyze"])
            .arg(&events)
            .assert()
            .success()
            .stdout("1 patients: 0 flagged (0 days), 0 failed\n");
    }

    #[test]
    fn threshold_out_of_range_is_args_error() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", EVENTS);

        mt_core(&dir)
            .args(["-f", "md", "--no-color", "analyze", "--threshold", "1.5"])
            .arg(&events)
            .assert()
            .code(10)
            .stderr(predicate::str::contains("threshold"));
    }

    #[test]
    fn pinned_states_missing_location_fails_patient() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", CLEAN_EVENTS);
        let states = write(&dir, "states.json", r#"["Hall"]"#);

        let output = mt_core(&dir)
            .args(["analyze", "--states"])
            .arg(&states)
            .arg(&events)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(v["failures"][0]["error"]["code"], 30);
    }

    #[test]
    fn missing_column_is_input_error() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", "patient_id,timestamp\na,2019-07-01 08:00:00\n");

        mt_core(&dir)
            .args(["analyze"])
            .arg(&events)
            .assert()
            .code(12)
            .stderr(predicate::str::contains("\"code\":22"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();

        mt_core(&dir)
            .args(["analyze"])
            .arg(dir.path().join("nope.csv"))
            .assert()
            .code(21);
    }

    #[test]
    fn config_file_thresholds_apply() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", EVENTS);
        write(
            &dir,
            "analysis.json",
            r#"{"schema_version":"1.0.0","occurrence_threshold":5}"#,
        );

        let output = mt_core(&dir)
            .arg("analyze")
            .arg(&events)
            .output()
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(v["config"]["occurrence_threshold"], 5);
        assert_eq!(v["summary"]["days_flagged"], 0);
        assert!(v["config"]["hash"].is_string());
    }
}

// ============================================================================
// matrix / states / check / version
// ============================================================================

mod other_commands {
    use super::*;

    #[test]
    fn matrix_json_has_one_model() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", EVENTS);

        let output = mt_core(&dir)
            .arg("matrix")
            .arg(&events)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(v["models"].as_array().unwrap().len(), 1);
        assert_eq!(v["models"][0]["patient_id"], "a");
        // 3 states -> 3 rows of 3
        assert_eq!(v["models"][0]["probabilities"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn states_csv_in_first_appearance_order() {
        let dir = TempDir::new().unwrap();
        let events = write(&dir, "events.csv", EVENTS);

        mt_core(&dir)
            .args(["-f", "csv", "states"])
            .arg(&events)
            .assert()
            .success()
            .stdout("index,state\n0,Hall\n1,Lounge\n2,Kitchen\n");
    }

    #[test]
    fn check_reports_defaults() {
        let dir = TempDir::new().unwrap();

        mt_core(&dir)
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"using_defaults\": true"));
    }

    #[test]
    fn check_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        write(&dir, "analysis.json", r#"{"probability_threshold":2.0}"#);

        mt_core(&dir).arg("check").assert().code(11);
    }

    #[test]
    fn check_rejects_multi_day_impute_step() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "analysis.json",
            r#"{"impute":{"night_step_minutes":9223372036854775807}}"#,
        );

        mt_core(&dir)
            .arg("check")
            .assert()
            .code(11)
            .stderr(predicate::str::contains("night_step_minutes"));
    }

    #[test]
    fn config_dir_flag_overrides_env() {
        let env_dir = TempDir::new().unwrap();
        let flag_dir = TempDir::new().unwrap();
        write(&flag_dir, "analysis.json", r#"{"occurrence_threshold":7}"#);

        let output = mt_core(&env_dir)
            .arg("--config-dir")
            .arg(flag_dir.path())
            .arg("check")
            .output()
            .unwrap();
        assert!(output.status.success());
        let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(v["using_defaults"], false);
        assert_eq!(v["config"]["occurrence_threshold"], 7);
    }

    #[test]
    fn version_prints_json() {
        let dir = TempDir::new().unwrap();

        mt_core(&dir)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"name\":\"mt-core\""));
    }

    #[test]
    fn unknown_command_fails() {
        let dir = TempDir::new().unwrap();

        mt_core(&dir)
            .arg("nonexistent-command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }
}
