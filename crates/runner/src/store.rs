//! Shared execution state for the current run
//!
//! One [`StatusStore`] lives for the whole process. The event processor of
//! the active run writes to it; any number of pollers read from it. Every
//! write carries the [`RunEpoch`] it was issued for, and writes from an epoch
//! older than the latest reset are dropped.

use std::collections::{BTreeMap, HashMap};

use casepilot_common::{
    status::now_timestamp, CodeVersion, ErrorLogEntry, ExecutionStatus, ExecutionStatusEntry,
    HealingPrompt, HealingType,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

/// Identifies one run between two resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RunEpoch(u64);

impl RunEpoch {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A status change for one test case
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub test_case_id: String,
    pub description: String,
    pub status: ExecutionStatus,
    pub failure_reason: String,
    pub attempts: u32,
    pub healing_type: Option<HealingType>,
    pub timestamp: Option<String>,
    pub screenshot_path: String,
    pub live_message: Option<String>,
}

impl StatusUpdate {
    pub fn new(test_case_id: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            test_case_id: test_case_id.into(),
            description: String::new(),
            status,
            failure_reason: String::new(),
            attempts: 0,
            healing_type: None,
            timestamp: None,
            screenshot_path: String::new(),
            live_message: None,
        }
    }
}

/// Everything a poller can see, captured under one lock
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub statuses: Vec<ExecutionStatusEntry>,
    pub live_messages: BTreeMap<String, String>,
    pub error_log: Vec<ErrorLogEntry>,
    pub code_versions: BTreeMap<String, Vec<CodeVersion>>,
    pub healing_prompts: BTreeMap<String, HealingPrompt>,
}

#[derive(Default)]
struct StoreState {
    epoch: u64,
    statuses: Vec<ExecutionStatusEntry>,
    codes: HashMap<String, Vec<CodeVersion>>,
    prompts: HashMap<String, HealingPrompt>,
    errors: Vec<ErrorLogEntry>,
    live: BTreeMap<String, String>,
}

/// Status, code, prompt, error and live-message stores behind one lock
#[derive(Default)]
pub struct StatusStore {
    state: Mutex<StoreState>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every store and start a new epoch
    pub fn reset(&self) -> RunEpoch {
        let mut state = self.state.lock();
        let epoch = state.epoch + 1;
        *state = StoreState {
            epoch,
            ..StoreState::default()
        };
        RunEpoch(epoch)
    }

    /// Upsert the entry for a test case. Returns `false` if the write was
    /// dropped as stale.
    pub fn update_status(&self, epoch: RunEpoch, update: StatusUpdate) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch.0 {
            trace!("Dropping stale status update for {}", update.test_case_id);
            return false;
        }

        let running_code = state
            .codes
            .get(&update.test_case_id)
            .and_then(|versions| versions.last())
            .map(|v| v.code.clone())
            .unwrap_or_default();

        // The engine only sends a description on some events
        let description = if update.description.is_empty() {
            state
                .statuses
                .iter()
                .find(|e| e.test_case_id == update.test_case_id)
                .map(|e| e.description.clone())
                .unwrap_or_default()
        } else {
            update.description
        };

        let entry = ExecutionStatusEntry {
            test_case_id: update.test_case_id.clone(),
            description,
            status: update.status,
            failure_reason: update.failure_reason,
            attempts: update.attempts,
            healing_type: update.healing_type,
            running_code,
            timestamp: update.timestamp.unwrap_or_else(now_timestamp),
            screenshot_path: update.screenshot_path,
        };

        let line = match update.live_message.filter(|m| !m.is_empty()) {
            Some(message) => message,
            None => entry.display_line(),
        };
        state.live.insert(entry.test_case_id.clone(), line);

        if entry.status.is_failure() && !entry.failure_reason.is_empty() {
            state.errors.push(ErrorLogEntry {
                testcase_id: entry.test_case_id.clone(),
                error_message: entry.failure_reason.clone(),
                attempt: entry.attempts,
                healing_type: entry.healing_type,
                code: entry.running_code.clone(),
                screenshot_path: entry.screenshot_path.clone(),
                timestamp: entry.timestamp.clone(),
            });
        }

        match state
            .statuses
            .iter_mut()
            .find(|e| e.test_case_id == entry.test_case_id)
        {
            Some(existing) => *existing = entry,
            None => state.statuses.push(entry),
        }
        true
    }

    /// Store a code version, replacing an earlier one with the same label
    pub fn record_code(&self, epoch: RunEpoch, test_case_id: &str, version: &str, code: &str) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch.0 {
            return false;
        }

        let versions = state.codes.entry(test_case_id.to_string()).or_default();
        // Re-recording a label moves it to the end so it counts as the latest
        versions.retain(|v| v.version != version);
        versions.push(CodeVersion {
            version: version.to_string(),
            code: code.to_string(),
        });
        true
    }

    pub fn record_prompt(&self, epoch: RunEpoch, test_case_id: &str, prompt: &str, timestamp: Option<String>) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch.0 {
            return false;
        }

        state.prompts.insert(
            test_case_id.to_string(),
            HealingPrompt {
                prompt: prompt.to_string(),
                timestamp: timestamp.unwrap_or_else(now_timestamp),
            },
        );
        true
    }

    pub fn set_live_message(&self, epoch: RunEpoch, test_case_id: &str, message: &str) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch.0 || message.is_empty() {
            return false;
        }

        state.live.insert(test_case_id.to_string(), message.to_string());
        true
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// Status entries in first-seen order
    pub fn statuses(&self) -> Vec<ExecutionStatusEntry> {
        self.state.lock().statuses.clone()
    }

    pub fn status(&self, test_case_id: &str) -> Option<ExecutionStatusEntry> {
        self.state
            .lock()
            .statuses
            .iter()
            .find(|e| e.test_case_id == test_case_id)
            .cloned()
    }

    pub fn code_versions(&self, test_case_id: &str) -> Vec<CodeVersion> {
        self.state
            .lock()
            .codes
            .get(test_case_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn healing_prompt(&self, test_case_id: &str) -> Option<HealingPrompt> {
        self.state.lock().prompts.get(test_case_id).cloned()
    }

    pub fn error_log(&self) -> Vec<ErrorLogEntry> {
        self.state.lock().errors.clone()
    }

    pub fn live_messages(&self) -> BTreeMap<String, String> {
        self.state.lock().live.clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock();
        StoreSnapshot {
            statuses: state.statuses.clone(),
            live_messages: state.live.clone(),
            error_log: state.errors.clone(),
            code_versions: state.codes.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            healing_prompts: state.prompts.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}
