//! Line-delimited JSON event protocol spoken by the generation/execution engine
//!
//! Every line the engine writes to stdout is one JSON object. The fields
//! shared by all events live on [`EngineEvent`]; the `event` tag and the
//! kind-specific fields decode into [`EventKind`].

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::status::HealingType;

/// A decoded engine event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineEvent {
    #[serde(rename = "testCaseID", default)]
    pub test_case_id: String,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Free-text progress line that overrides the rendered status
    #[serde(rename = "liveMessage", default)]
    pub live_message: Option<String>,

    #[serde(flatten)]
    pub kind: EventKind,
}

/// Kind-specific part of an engine event, discriminated by `event`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    ScriptGenerationStarted {
        #[serde(default)]
        progress: Option<String>,
    },
    FileCreated,
    TestExecutionStarted {
        #[serde(default = "first_attempt", deserialize_with = "lenient_first_attempt")]
        attempt: u32,
        #[serde(rename = "healingType", default)]
        healing_type: Option<HealingType>,
    },
    TestPassed {
        #[serde(default, deserialize_with = "lenient_attempt")]
        attempt: u32,
        #[serde(rename = "healingType", default)]
        healing_type: Option<HealingType>,
    },
    TestFailed {
        error: String,
        #[serde(default, deserialize_with = "lenient_attempt")]
        attempt: u32,
        #[serde(rename = "healingType", default)]
        healing_type: Option<HealingType>,
        #[serde(rename = "screenshotPath", default)]
        screenshot_path: Option<String>,
    },
    SelfHealingStarted {
        #[serde(rename = "type", default)]
        healing_type: Option<HealingType>,
        #[serde(default, deserialize_with = "lenient_attempt")]
        attempt: u32,
    },
    LocalFixApplied,
    GeminiFixApplied {
        #[serde(rename = "screenshotUsed", default)]
        screenshot_used: bool,
    },
    AdvancedFixApplied,
    CodeGenerated {
        version: String,
        code: String,
    },
    FullHealingPrompt {
        prompt: String,
    },
    ScreenshotCaptured {
        #[serde(default, deserialize_with = "lenient_attempt")]
        attempt: u32,
        #[serde(rename = "screenshotPath", default)]
        screenshot_path: Option<String>,
    },
    TestFinalFailure,
    AllTestsCompleted,
    /// Engine diagnostics, logged only
    Info {
        #[serde(default)]
        message: String,
    },
    /// Engine-side errors that are not test outcomes, logged only
    Error {
        #[serde(default)]
        message: String,
    },
    /// Unknown tag, or a known tag missing required fields
    #[serde(other)]
    Unrecognized,
}

fn first_attempt() -> u32 {
    1
}

/// Attempt counters arrive as numbers or numeric strings depending on the
/// engine build. Anything else counts as unknown.
fn attempt_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_attempt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(attempt_value(&value).unwrap_or(0))
}

fn lenient_first_attempt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(attempt_value(&value).unwrap_or_else(first_attempt))
}

impl EventKind {
    /// Wire name of the event tag
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ScriptGenerationStarted { .. } => "script_generation_started",
            EventKind::FileCreated => "file_created",
            EventKind::TestExecutionStarted { .. } => "test_execution_started",
            EventKind::TestPassed { .. } => "test_passed",
            EventKind::TestFailed { .. } => "test_failed",
            EventKind::SelfHealingStarted { .. } => "self_healing_started",
            EventKind::LocalFixApplied => "local_fix_applied",
            EventKind::GeminiFixApplied { .. } => "gemini_fix_applied",
            EventKind::AdvancedFixApplied => "advanced_fix_applied",
            EventKind::CodeGenerated { .. } => "code_generated",
            EventKind::FullHealingPrompt { .. } => "full_healing_prompt",
            EventKind::ScreenshotCaptured { .. } => "screenshot_captured",
            EventKind::TestFinalFailure => "test_final_failure",
            EventKind::AllTestsCompleted => "all_tests_completed",
            EventKind::Info { .. } => "info",
            EventKind::Error { .. } => "error",
            EventKind::Unrecognized => "unrecognized",
        }
    }
}

impl EngineEvent {
    /// Decode one output line.
    ///
    /// Returns `None` for anything that is not a JSON object. Objects that do
    /// not fit a known event shape decode to [`EventKind::Unrecognized`].
    pub fn decode_line(line: &str) -> Option<EngineEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let value: Value = serde_json::from_str(trimmed).ok()?;
        if !value.is_object() {
            return None;
        }

        match EngineEvent::deserialize(&value) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("Unrecognized engine event shape: {}", e);
                Some(EngineEvent::unrecognized(&value))
            }
        }
    }

    fn unrecognized(value: &Value) -> EngineEvent {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        EngineEvent {
            test_case_id: text("testCaseID").unwrap_or_default(),
            timestamp: text("timestamp"),
            description: text("description").unwrap_or_default(),
            live_message: text("liveMessage"),
            kind: EventKind::Unrecognized,
        }
    }
}
