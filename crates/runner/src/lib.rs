//! Casepilot runner
//!
//! Supervises the external generation/execution engine and tracks what it
//! reports. The engine receives the extracted test cases on stdin and answers
//! with one JSON event per stdout line; the [`EventProcessor`] folds those
//! events into the shared [`StatusStore`], which any number of callers may
//! poll while the run is in progress.

pub mod config;
pub mod engine;
pub mod error;
pub mod processor;
pub mod sentinel;
pub mod store;
pub mod supervisor;

pub use config::{EngineConfig, RunnerConfig};
pub use engine::{EngineProcess, Termination};
pub use error::{RunnerError, RunnerResult};
pub use processor::{EventProcessor, Flow, ProcessSummary};
pub use sentinel::StopSentinel;
pub use store::{RunEpoch, StatusStore, StatusUpdate, StoreSnapshot};
pub use supervisor::{RunOutcome, RunSupervisor};
