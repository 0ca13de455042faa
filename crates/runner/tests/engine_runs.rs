//! Run lifecycle tests against a scripted engine
//!
//! The engine is a `sh` script that stores the test cases it receives and
//! replays a canned event stream.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use casepilot_common::{ExecutionStatus, HealingType, Step, TestCase};
use casepilot_runner::{EngineConfig, RunSupervisor, RunnerConfig, RunnerError};
use tempfile::TempDir;

fn config(dir: &Path, script: &str) -> RunnerConfig {
    RunnerConfig {
        engine: EngineConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: Some(dir.to_path_buf()),
            env: BTreeMap::new(),
        },
        stop_timeout_secs: 1,
        ..RunnerConfig::default()
    }
}

/// Engine that saves its stdin to `cases.json` and then prints `events`
fn replay_script(events: &[&str]) -> String {
    format!("cat > cases.json\ncat <<'EOF'\n{}\nEOF\n", events.join("\n"))
}

fn case(id: &str) -> TestCase {
    TestCase {
        id: id.to_string(),
        title: format!("{} title", id),
        description: "Login with valid user".to_string(),
        steps: vec![Step {
            number: 1,
            action: "Open login page".to_string(),
            expected_result: "Login page shown".to_string(),
            matched_test_data: vec![],
        }],
        summary: TestCase::summarize("Login with valid user"),
        ..TestCase::default()
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_healing_lifecycle_is_tracked() {
    let dir = TempDir::new().unwrap();
    let script = replay_script(&[
        r#"{"event":"info","message":"starting"}"#,
        r#"{"event":"script_generation_started","testCaseID":"TC001","description":"Login","timestamp":"t1"}"#,
        r#"{"event":"code_generated","testCaseID":"TC001","version":"initial","code":"v1"}"#,
        r#"{"event":"file_created","testCaseID":"TC001","timestamp":"t2"}"#,
        r#"{"event":"test_execution_started","testCaseID":"TC001","attempt":1,"healingType":"initial"}"#,
        r#"{"event":"test_failed","testCaseID":"TC001","error":"Timeout 30000ms","attempt":1,"healingType":"initial","screenshotPath":"shots/TC001.png"}"#,
        "npm WARN something unrelated",
        r#"{"event":"self_healing_started","testCaseID":"TC001","type":"gemini","attempt":1}"#,
        r#"{"event":"full_healing_prompt","testCaseID":"TC001","prompt":"repair this","timestamp":"t3"}"#,
        r#"{"event":"code_generated","testCaseID":"TC001","version":"gemini","code":"v2"}"#,
        r#"{"event":"gemini_fix_applied","testCaseID":"TC001","screenshotUsed":true}"#,
        r#"{"event":"test_execution_started","testCaseID":"TC001","attempt":2,"healingType":"gemini"}"#,
        r#"{"event":"test_passed","testCaseID":"TC001","attempt":2,"healingType":"gemini","liveMessage":"TC001 healed by AI"}"#,
        r#"{"event":"all_tests_completed"}"#,
    ]);
    let supervisor = RunSupervisor::new(config(dir.path(), &script));

    supervisor.start_run(&[case("TC001")]).await.unwrap();
    let outcome = supervisor.wait().await.unwrap().unwrap();

    assert!(outcome.summary.completed);
    assert_eq!(outcome.summary.skipped, 1);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(!outcome.stopped);

    let store = supervisor.store();
    let entry = store.status("TC001").unwrap();
    assert_eq!(entry.status, ExecutionStatus::Passed);
    assert_eq!(entry.attempts, 2);
    assert_eq!(entry.healing_type, Some(HealingType::Ai));
    assert_eq!(entry.running_code, "v2");

    let log = store.error_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].error_message, "Timeout 30000ms");
    assert_eq!(log[0].code, "v1");
    assert_eq!(log[0].screenshot_path, "shots/TC001.png");

    assert_eq!(store.code_versions("TC001").len(), 2);
    assert_eq!(store.healing_prompt("TC001").unwrap().prompt, "repair this");
    assert_eq!(store.live_messages()["TC001"], "TC001 healed by AI");

    let handed_off = std::fs::read_to_string(dir.path().join("cases.json")).unwrap();
    let cases: serde_json::Value = serde_json::from_str(&handed_off).unwrap();
    assert_eq!(cases[0]["TestCaseID"], "TC001");
    assert_eq!(cases[0]["Steps"][0]["ExpectedResult"], "Login page shown");
}

#[tokio::test]
async fn test_final_failure_after_exhausted_attempts() {
    let dir = TempDir::new().unwrap();
    let script = replay_script(&[
        r#"{"event":"test_failed","testCaseID":"TC001","error":"still broken","attempt":4,"healingType":"advanced"}"#,
        r#"{"event":"test_final_failure","testCaseID":"TC001","attempt":4}"#,
        r#"{"event":"all_tests_completed"}"#,
    ]);
    let supervisor = RunSupervisor::new(config(dir.path(), &script));

    supervisor.start_run(&[case("TC001")]).await.unwrap();
    supervisor.wait().await.unwrap();

    let store = supervisor.store();
    let entry = store.status("TC001").unwrap();
    assert_eq!(entry.status, ExecutionStatus::Failed);
    assert_eq!(entry.attempts, 4);
    assert_eq!(entry.healing_type, Some(HealingType::FinalFailure));
    assert_eq!(store.error_log().len(), 2);
}

#[tokio::test]
async fn test_engine_crash_keeps_last_known_state() {
    let dir = TempDir::new().unwrap();
    let script = format!(
        "{}exit 2\n",
        replay_script(&[
            r#"{"event":"test_execution_started","testCaseID":"TC001","attempt":1}"#,
        ])
    );
    let supervisor = RunSupervisor::new(config(dir.path(), &script));

    supervisor.start_run(&[case("TC001")]).await.unwrap();
    let outcome = supervisor.wait().await.unwrap().unwrap();

    assert_eq!(outcome.exit_code, Some(2));
    assert!(!outcome.summary.completed);
    assert_eq!(
        supervisor.store().status("TC001").unwrap().status,
        ExecutionStatus::Running { attempt: 1 }
    );
}

#[tokio::test]
async fn test_new_run_resets_stores_and_clears_sentinel() {
    let dir = TempDir::new().unwrap();
    // Reports TC001 on the first run and TC002 once `second` exists
    let script = concat!(
        "cat > /dev/null\n",
        "if [ -f second ]; then ID=TC002; else ID=TC001; fi\n",
        "echo \"{\\\"event\\\":\\\"test_passed\\\",\\\"testCaseID\\\":\\\"$ID\\\",\\\"attempt\\\":1}\"\n",
    );
    let supervisor = RunSupervisor::new(config(dir.path(), script));

    let first = supervisor.start_run(&[case("TC001")]).await.unwrap();
    supervisor.wait().await.unwrap();
    assert!(supervisor.store().status("TC001").is_some());

    std::fs::write(dir.path().join("second"), "").unwrap();
    std::fs::write(dir.path().join("stop.txt"), "stop").unwrap();
    let second = supervisor.start_run(&[case("TC002")]).await.unwrap();
    assert!(second > first);
    assert!(!supervisor.sentinel().is_raised());
    supervisor.wait().await.unwrap();

    let ids: Vec<_> = supervisor
        .store()
        .statuses()
        .into_iter()
        .map(|e| e.test_case_id)
        .collect();
    assert_eq!(ids, vec!["TC002"]);
}

#[tokio::test]
async fn test_stop_kills_unresponsive_engine_and_freezes_store() {
    let dir = TempDir::new().unwrap();
    let script = concat!(
        "trap '' TERM\n",
        "cat > /dev/null\n",
        "echo '{\"event\":\"test_execution_started\",\"testCaseID\":\"TC001\",\"attempt\":1}'\n",
        "while true; do\n",
        "  echo '{\"event\":\"test_execution_started\",\"testCaseID\":\"TC001\",\"attempt\":2}'\n",
        "  sleep 0.05\n",
        "done\n",
    );
    let supervisor = RunSupervisor::new(config(dir.path(), script));
    supervisor.start_run(&[case("TC001")]).await.unwrap();

    let store = supervisor.store();
    wait_for(|| store.status("TC001").is_some()).await;
    assert!(supervisor.is_running());

    let outcome = supervisor.stop_run().await.unwrap().unwrap();
    assert!(outcome.stopped);
    assert!(outcome.forced_kill);
    assert!(outcome.summary.cancelled);
    assert!(supervisor.sentinel().is_raised());
    assert!(!supervisor.is_running());

    let frozen = store.snapshot();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let later = store.snapshot();
    assert_eq!(frozen.statuses, later.statuses);
    assert_eq!(frozen.live_messages, later.live_messages);
}

#[tokio::test]
async fn test_stop_on_cooperative_engine_is_graceful() {
    let dir = TempDir::new().unwrap();
    let script = "cat > /dev/null\nwhile [ ! -f stop.txt ]; do sleep 0.05; done\n";
    let supervisor = RunSupervisor::new(config(dir.path(), script));
    supervisor.start_run(&[case("TC001")]).await.unwrap();

    let outcome = supervisor.stop_run().await.unwrap().unwrap();
    assert!(outcome.stopped);
    assert!(!outcome.forced_kill);
}

#[tokio::test]
async fn test_missing_engine_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), "");
    cfg.engine.program = "/nonexistent/engine".to_string();
    let supervisor = RunSupervisor::new(cfg);

    let err = supervisor.start_run(&[case("TC001")]).await.unwrap_err();
    assert!(matches!(err, RunnerError::EngineSpawn(_)));
    assert!(!err.is_input_error());
}
