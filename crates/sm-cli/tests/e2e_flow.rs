//! End-to-end integration tests for the complete monitoring flow.
//!
//! Exercises the binary the way a device agent would: seed rules,
//! ingest events, record the self-report, evaluate the day, inspect.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn sm_binary() -> String {
    env!("CARGO_BIN_EXE_sm").to_string()
}

/// Run the binary against an isolated database, pinned to UTC so that
/// local-day windows are deterministic.
fn sm(db_path: &Path, args: &[&str]) -> std::process::Output {
    Command::new(sm_binary())
        .env("TZ", "UTC")
        .env("SM_DATABASE_PATH", db_path)
        .args(args)
        .output()
        .expect("failed to run sm")
}

fn assert_success(output: &std::process::Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn full_day_flow_produces_a_verdict() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("sm.db");

    assert_success(&sm(&db_path, &["rules", "set", "com.example.editor", "work"]));
    assert_success(&sm(
        &db_path,
        &["rules", "set", "com.twitter.android", "distraction"],
    ));

    // One minute of work, backfilled into a fixed day.
    for ts in [
        "2026-03-05T09:00:00Z",
        "2026-03-05T09:00:30Z",
        "2026-03-05T09:01:00Z",
    ] {
        assert_success(&sm(
            &db_path,
            &[
                "ingest",
                "--app",
                "com.example.editor",
                "--timestamp",
                ts,
                "--device",
                "laptop",
            ],
        ));
    }

    assert_success(&sm(
        &db_path,
        &["manual", "--date", "2026-03-05", "--study", "--diet", "--sugar"],
    ));

    // Work goal unmet, distraction clean, self-report complete: yellow.
    let output = assert_success(&sm(&db_path, &["pipeline", "--date", "2026-03-05"]));
    assert!(
        output.contains("2026-03-05: yellow"),
        "unexpected pipeline output: {output}"
    );
    assert!(
        output.contains("sync disabled"),
        "unexpected pipeline output: {output}"
    );

    let db = sm_db::Database::open(&db_path).unwrap();
    let log = db
        .daily_log(chrono::NaiveDate::from_ymd_opt(2026, 3, 5).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(log.total_work_sec, 60);
    assert_eq!(log.verdict, sm_core::Verdict::Yellow);
}

#[test]
fn classify_uses_stored_rules() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("sm.db");

    assert_success(&sm(
        &db_path,
        &["rules", "set", "com.twitter.android", "distraction"],
    ));

    let output = assert_success(&sm(&db_path, &["classify", "com.twitter.android"]));
    assert_eq!(output.trim(), "com.twitter.android: distraction");

    let output = assert_success(&sm(&db_path, &["classify", "com.example.unknown"]));
    assert_eq!(output.trim(), "com.example.unknown: neutral");
}

#[test]
fn status_json_reflects_pending_events() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("sm.db");

    assert_success(&sm(&db_path, &["ingest", "--app", "com.example.editor"]));

    let output = assert_success(&sm(&db_path, &["status", "--json"]));
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["pending_push"], 1);
    assert_eq!(value["sync_status"], "never synced");
    assert_eq!(value["enforcement"]["block_non_essential"], false);
}

#[test]
fn sync_without_remote_is_disabled() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("sm.db");

    let output = assert_success(&sm(&db_path, &["sync"]));
    assert_eq!(output.trim(), "sync disabled: no remote configured");

    let db = sm_db::Database::open(&db_path).unwrap();
    assert_eq!(
        db.get_config("sync_status").unwrap().as_deref(),
        Some("disabled: no remote configured")
    );
}

#[test]
fn enforcement_defaults_to_unrestricted() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("sm.db");

    let output = assert_success(&sm(&db_path, &["enforcement"]));
    assert_eq!(output.trim(), "unrestricted");
}

#[test]
fn invalid_category_fails_loudly() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("sm.db");

    let output = sm(&db_path, &["rules", "set", "com.example.game", "gaming"]);
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("invalid category"),
        "unexpected stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
