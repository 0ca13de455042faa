//! Error types for engine runs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to start engine: {0}")]
    EngineSpawn(String),

    #[error("No test cases to run")]
    NoTestCases,

    #[error("Engine process error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] casepilot_common::Error),
}

impl RunnerError {
    /// Rejections caused by the request rather than the environment
    pub fn is_input_error(&self) -> bool {
        match self {
            RunnerError::NoTestCases => true,
            RunnerError::Common(e) => e.is_input_error(),
            _ => false,
        }
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;
