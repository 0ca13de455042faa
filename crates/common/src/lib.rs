//! Casepilot Common Library
//!
//! Shared types for the Casepilot workspace: the test case model produced by
//! spreadsheet extraction, the per-run execution records, and the event
//! protocol spoken by the external generation/execution engine.

pub mod error;
pub mod events;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use events::{EngineEvent, EventKind};
pub use status::{
    CodeVersion, ErrorLogEntry, ExecutionStatus, ExecutionStatusEntry, HealingPrompt, HealingType,
    MAX_ATTEMPTS,
};
pub use types::*;

/// Casepilot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
