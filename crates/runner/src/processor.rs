//! Execution event processor
//!
//! Consumes the engine's line-delimited JSON output and turns each event
//! into store mutations. Lines that are not JSON objects are skipped.
//!
//! Per test case the engine walks
//! `Generating → Generated → Running(n) → Passed | Failed → Healing → Running(n+1)`
//! up to attempt [`MAX_ATTEMPTS`], ending in `test_final_failure` when no
//! attempt passes. The processor applies events as they come, last write wins.

use std::sync::Arc;

use casepilot_common::{EngineEvent, EventKind, ExecutionStatus, HealingType, MAX_ATTEMPTS};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::store::{RunEpoch, StatusStore, StatusUpdate};

/// Whether the stream is still expected to carry events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Completed,
}

/// Counters for one pass over the engine output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub lines: usize,
    pub applied: usize,
    pub skipped: usize,
    /// `all_tests_completed` was seen
    pub completed: bool,
    /// Reading stopped because the run was cancelled
    pub cancelled: bool,
}

/// Applies engine events to the store on behalf of one run
pub struct EventProcessor {
    store: Arc<StatusStore>,
    epoch: RunEpoch,
}

impl EventProcessor {
    pub fn new(store: Arc<StatusStore>, epoch: RunEpoch) -> Self {
        Self { store, epoch }
    }

    /// Read lines until EOF or cancellation.
    ///
    /// Cancellation is checked before every read, so no line read after a
    /// stop request is applied. Read errors end the pass.
    pub async fn run<R>(&self, mut reader: R, cancel: &CancellationToken) -> ProcessSummary
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = ProcessSummary::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Event processing cancelled");
                    summary.cancelled = true;
                    break;
                }
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read engine output: {}", e);
                    break;
                }
            }

            summary.lines += 1;
            let line = String::from_utf8_lossy(&buf);
            match self.apply_line(&line) {
                Some(flow) => {
                    summary.applied += 1;
                    if flow == Flow::Completed {
                        summary.completed = true;
                    }
                }
                None => summary.skipped += 1,
            }
        }

        summary
    }

    /// Decode and apply one line. `None` means the line was skipped.
    pub fn apply_line(&self, line: &str) -> Option<Flow> {
        match EngineEvent::decode_line(line) {
            Some(event) => Some(self.apply(event)),
            None => {
                trace!("Skipping non-event line: {}", line.trim_end());
                None
            }
        }
    }

    /// Apply one decoded event
    pub fn apply(&self, event: EngineEvent) -> Flow {
        let EngineEvent {
            test_case_id: id,
            timestamp,
            description,
            live_message,
            kind,
        } = event;

        let status_update = |status: ExecutionStatus| StatusUpdate {
            test_case_id: id.clone(),
            description: description.clone(),
            status,
            failure_reason: String::new(),
            attempts: 0,
            healing_type: None,
            timestamp: timestamp.clone(),
            screenshot_path: String::new(),
            live_message: live_message.clone(),
        };

        let update = match kind {
            EventKind::ScriptGenerationStarted { progress } => {
                Some(status_update(ExecutionStatus::GeneratingScript { progress }))
            }
            EventKind::FileCreated => Some(status_update(ExecutionStatus::ScriptGenerated)),
            EventKind::TestExecutionStarted { attempt, healing_type } => Some(StatusUpdate {
                attempts: attempt,
                healing_type: Some(healing_type.unwrap_or(HealingType::Initial)),
                ..status_update(ExecutionStatus::Running { attempt })
            }),
            EventKind::TestPassed { attempt, healing_type } => Some(StatusUpdate {
                attempts: attempt,
                healing_type: Some(healing_type.unwrap_or(HealingType::Initial)),
                ..status_update(ExecutionStatus::Passed)
            }),
            EventKind::TestFailed {
                error,
                attempt,
                healing_type,
                screenshot_path,
            } => Some(StatusUpdate {
                failure_reason: error,
                attempts: attempt,
                healing_type: Some(healing_type.unwrap_or(HealingType::Initial)),
                screenshot_path: screenshot_path.unwrap_or_default(),
                ..status_update(ExecutionStatus::Failed)
            }),
            EventKind::SelfHealingStarted { healing_type, attempt } => {
                let healing_type = healing_type.unwrap_or(HealingType::Unknown);
                Some(StatusUpdate {
                    failure_reason: format!("Applying {} fix", healing_type),
                    attempts: attempt,
                    healing_type: Some(healing_type),
                    ..status_update(ExecutionStatus::SelfHealing)
                })
            }
            EventKind::LocalFixApplied => Some(status_update(ExecutionStatus::LocalFixApplied)),
            EventKind::GeminiFixApplied { screenshot_used } => Some(status_update(
                ExecutionStatus::AiFixApplied {
                    with_screenshot: screenshot_used,
                },
            )),
            EventKind::AdvancedFixApplied => Some(status_update(ExecutionStatus::AdvancedFixApplied)),
            EventKind::TestFinalFailure => Some(StatusUpdate {
                failure_reason: "Failed after all attempts".to_string(),
                attempts: MAX_ATTEMPTS,
                healing_type: Some(HealingType::FinalFailure),
                ..status_update(ExecutionStatus::Failed)
            }),
            EventKind::CodeGenerated { version, code } => {
                if !id.is_empty() {
                    debug!("Code version '{}' for {}", version, id);
                    self.store.record_code(self.epoch, &id, &version, &code);
                }
                None
            }
            EventKind::FullHealingPrompt { prompt } => {
                if !id.is_empty() {
                    self.store.record_prompt(self.epoch, &id, &prompt, timestamp.clone());
                }
                None
            }
            EventKind::ScreenshotCaptured {
                attempt,
                screenshot_path,
            } => {
                info!(
                    "Screenshot captured for {} attempt {}: {}",
                    id,
                    attempt,
                    screenshot_path.as_deref().unwrap_or("-")
                );
                None
            }
            EventKind::AllTestsCompleted => {
                info!("All test cases have been processed");
                return Flow::Completed;
            }
            EventKind::Info { message } => {
                info!("[engine] {}", message);
                None
            }
            EventKind::Error { message } => {
                warn!("[engine] {}", message);
                None
            }
            EventKind::Unrecognized => {
                debug!("Ignoring unrecognized event for '{}'", id);
                None
            }
        };

        match update {
            Some(update) if !update.test_case_id.is_empty() => {
                self.store.update_status(self.epoch, update);
            }
            Some(_) => debug!("Status event without testCaseID ignored"),
            None => {
                if let Some(message) = live_message.as_deref().filter(|_| !id.is_empty()) {
                    self.store.set_live_message(self.epoch, &id, message);
                }
            }
        }

        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn processor() -> (Arc<StatusStore>, EventProcessor) {
        let store = Arc::new(StatusStore::new());
        let epoch = store.reset();
        (store.clone(), EventProcessor::new(store, epoch))
    }

    #[test]
    fn test_replayed_pass_updates_in_place() {
        let (store, p) = processor();
        let line = r#"{"event":"test_passed","testCaseID":"TC001","attempt":1,"timestamp":"t"}"#;
        p.apply_line(line);
        p.apply_line(line);

        let statuses = store.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, ExecutionStatus::Passed);
    }

    #[test_case(r#"{"event":"script_generation_started","testCaseID":"TC001","progress":"50%"}"#, "Generating Script (50%)" ; "generation progress")]
    #[test_case(r#"{"event":"file_created","testCaseID":"TC001"}"#, "Script Generated" ; "file created")]
    #[test_case(r#"{"event":"local_fix_applied","testCaseID":"TC001"}"#, "Local Fix Applied" ; "local fix")]
    #[test_case(r#"{"event":"gemini_fix_applied","testCaseID":"TC001","screenshotUsed":true}"#, "AI Fix Applied (with screenshot)" ; "ai fix with screenshot")]
    #[test_case(r#"{"event":"gemini_fix_applied","testCaseID":"TC001"}"#, "AI Fix Applied" ; "ai fix")]
    #[test_case(r#"{"event":"advanced_fix_applied","testCaseID":"TC001"}"#, "Advanced Fix Applied" ; "advanced fix")]
    fn test_status_labels(line: &str, expected: &str) {
        let (store, p) = processor();
        p.apply_line(line);
        assert_eq!(store.status("TC001").unwrap().status.to_string(), expected);
        assert_eq!(store.live_messages()["TC001"], expected);
    }

    #[test]
    fn test_status_event_without_id_is_ignored() {
        let (store, p) = processor();
        assert_eq!(
            p.apply_line(r#"{"event":"test_passed","attempt":1}"#),
            Some(Flow::Continue)
        );
        assert!(store.statuses().is_empty());
    }

    #[test]
    fn test_live_message_on_non_status_event() {
        let (store, p) = processor();
        p.apply_line(r#"{"event":"screenshot_captured","testCaseID":"TC001","liveMessage":"Captured screenshot"}"#);
        assert_eq!(store.live_messages()["TC001"], "Captured screenshot");
        assert!(store.statuses().is_empty());
    }

    #[test]
    fn test_final_failure_pins_attempts_and_healing() {
        let (store, p) = processor();
        p.apply_line(r#"{"event":"test_final_failure","testCaseID":"TC001","attempt":9,"timestamp":"t"}"#);

        let entry = store.status("TC001").unwrap();
        assert_eq!(entry.status, ExecutionStatus::Failed);
        assert_eq!(entry.attempts, 4);
        assert_eq!(entry.healing_type, Some(HealingType::FinalFailure));
        assert_eq!(entry.failure_reason, "Failed after all attempts");
        assert_eq!(store.error_log().len(), 1);
    }

    #[test]
    fn test_description_kept_after_execution_starts() {
        let (store, p) = processor();
        p.apply_line(r#"{"event":"script_generation_started","testCaseID":"TC001","description":"Valid login"}"#);
        p.apply_line(r#"{"event":"test_execution_started","testCaseID":"TC001","attempt":1}"#);

        let entry = store.status("TC001").unwrap();
        assert_eq!(entry.status, ExecutionStatus::Running { attempt: 1 });
        assert_eq!(entry.description, "Valid login");
    }

    #[test]
    fn test_failure_with_string_attempt_is_recorded() {
        let (store, p) = processor();
        p.apply_line(
            r#"{"event":"test_failed","testCaseID":"TC001","error":"Timeout","attempt":"2","healingType":"local"}"#,
        );

        let entry = store.status("TC001").unwrap();
        assert_eq!(entry.status, ExecutionStatus::Failed);
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.failure_reason, "Timeout");
        let errors = store.error_log();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].attempt, 2);
    }

    #[test]
    fn test_self_healing_reason() {
        let (store, p) = processor();
        p.apply_line(r#"{"event":"self_healing_started","testCaseID":"TC001","type":"local","attempt":1}"#);

        let entry = store.status("TC001").unwrap();
        assert_eq!(entry.status, ExecutionStatus::SelfHealing);
        assert_eq!(entry.failure_reason, "Applying local fix");
        assert!(store.error_log().is_empty());
    }

    #[test]
    fn test_malformed_lines_leave_store_untouched() {
        let (store, p) = processor();
        assert_eq!(p.apply_line("npm WARN deprecated"), None);
        assert_eq!(p.apply_line(r#"{"event":"test_passed","#), None);
        assert!(store.snapshot().statuses.is_empty());
        assert!(store.live_messages().is_empty());
    }

    #[test]
    fn test_code_and_prompt_events() {
        let (store, p) = processor();
        p.apply_line(r#"{"event":"code_generated","testCaseID":"TC001","version":"initial","code":"a"}"#);
        p.apply_line(r#"{"event":"full_healing_prompt","testCaseID":"TC001","prompt":"fix","timestamp":"10:00"}"#);

        assert_eq!(store.code_versions("TC001").len(), 1);
        let prompt = store.healing_prompt("TC001").unwrap();
        assert_eq!(prompt.prompt, "fix");
        assert_eq!(prompt.timestamp, "10:00");
        assert!(store.statuses().is_empty());
    }

    #[test]
    fn test_completion_event() {
        let (_, p) = processor();
        assert_eq!(
            p.apply_line(r#"{"event":"all_tests_completed","timestamp":"t"}"#),
            Some(Flow::Completed)
        );
    }

    #[tokio::test]
    async fn test_run_counts_lines() {
        let (store, p) = processor();
        let input = concat!(
            "{\"event\":\"file_created\",\"testCaseID\":\"TC001\"}\n",
            "garbage\n",
            "{\"event\":\"test_execution_started\",\"testCaseID\":\"TC001\",\"attempt\":1}\n",
            "{\"event\":\"all_tests_completed\"}\n",
        );

        let summary = p.run(input.as_bytes(), &CancellationToken::new()).await;
        assert_eq!(summary.lines, 4);
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.skipped, 1);
        assert!(summary.completed);
        assert_eq!(
            store.status("TC001").unwrap().status,
            ExecutionStatus::Running { attempt: 1 }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_read_applies_nothing() {
        let (store, p) = processor();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let input = "{\"event\":\"test_passed\",\"testCaseID\":\"TC001\"}\n";
        let summary = p.run(input.as_bytes(), &cancel).await;
        assert!(summary.cancelled);
        assert_eq!(summary.lines, 0);
        assert!(store.statuses().is_empty());
    }
}
