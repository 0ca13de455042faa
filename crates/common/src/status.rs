//! Execution status records kept per test case during a run

use serde::{Deserialize, Serialize, Serializer};

/// Attempt number at which the engine gives up on a test case
pub const MAX_ATTEMPTS: u32 = 4;

/// Healing stage that produced the current attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum HealingType {
    Initial,
    Local,
    Ai,
    Advanced,
    FinalFailure,
    Unknown,
}

impl From<String> for HealingType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "initial" => HealingType::Initial,
            "local" => HealingType::Local,
            // The engine names the AI stage after its model provider
            "ai" | "gemini" => HealingType::Ai,
            "advanced" => HealingType::Advanced,
            "final_failure" => HealingType::FinalFailure,
            _ => HealingType::Unknown,
        }
    }
}

impl std::fmt::Display for HealingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealingType::Initial => write!(f, "initial"),
            HealingType::Local => write!(f, "local"),
            HealingType::Ai => write!(f, "ai"),
            HealingType::Advanced => write!(f, "advanced"),
            HealingType::FinalFailure => write!(f, "final_failure"),
            HealingType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Status of one test case as last reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    GeneratingScript { progress: Option<String> },
    ScriptGenerated,
    Running { attempt: u32 },
    Passed,
    Failed,
    SelfHealing,
    LocalFixApplied,
    AiFixApplied { with_screenshot: bool },
    AdvancedFixApplied,
}

impl ExecutionStatus {
    /// Failing statuses produce an error log entry when they carry a reason
    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionStatus::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Passed | ExecutionStatus::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::GeneratingScript { progress: Some(p) } if !p.is_empty() => {
                write!(f, "Generating Script ({})", p)
            }
            ExecutionStatus::GeneratingScript { .. } => write!(f, "Generating Script"),
            ExecutionStatus::ScriptGenerated => write!(f, "Script Generated"),
            ExecutionStatus::Running { attempt } => write!(f, "Running (Attempt {})", attempt),
            ExecutionStatus::Passed => write!(f, "Passed"),
            ExecutionStatus::Failed => write!(f, "Failed"),
            ExecutionStatus::SelfHealing => write!(f, "Self-healing"),
            ExecutionStatus::LocalFixApplied => write!(f, "Local Fix Applied"),
            ExecutionStatus::AiFixApplied { with_screenshot: true } => {
                write!(f, "AI Fix Applied (with screenshot)")
            }
            ExecutionStatus::AiFixApplied { .. } => write!(f, "AI Fix Applied"),
            ExecutionStatus::AdvancedFixApplied => write!(f, "Advanced Fix Applied"),
        }
    }
}

impl Serialize for ExecutionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Latest known state of one test case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStatusEntry {
    #[serde(rename = "Test Case ID")]
    pub test_case_id: String,
    #[serde(rename = "Test Case Description")]
    pub description: String,
    #[serde(rename = "Status")]
    pub status: ExecutionStatus,
    #[serde(rename = "Failure Reason")]
    pub failure_reason: String,
    #[serde(rename = "Attempts")]
    pub attempts: u32,
    #[serde(rename = "Healing Type")]
    pub healing_type: Option<HealingType>,
    #[serde(rename = "Running Code")]
    pub running_code: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Screenshot Path")]
    pub screenshot_path: String,
}

impl ExecutionStatusEntry {
    /// Status line shown when the engine supplied no live message:
    /// status, then `- Attempt N` when attempts were made, then the healing
    /// stage unless it is the initial one.
    pub fn display_line(&self) -> String {
        let mut line = self.status.to_string();
        if self.attempts > 0 {
            line.push_str(&format!(" - Attempt {}", self.attempts));
        }
        match self.healing_type {
            Some(HealingType::Initial) | None => {}
            Some(kind) => line.push_str(&format!(" ({})", kind)),
        }
        line
    }
}

/// One generated script revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVersion {
    pub version: String,
    pub code: String,
}

/// Most recent prompt sent to the healing model for a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingPrompt {
    pub prompt: String,
    pub timestamp: String,
}

/// Record of a test case entering a failing status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorLogEntry {
    pub testcase_id: String,
    pub error_message: String,
    pub attempt: u32,
    pub healing_type: Option<HealingType>,
    pub code: String,
    pub screenshot_path: String,
    pub timestamp: String,
}

/// Local wall-clock time in the format the engine uses
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
