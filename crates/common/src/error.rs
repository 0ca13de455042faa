//! Error types for Casepilot

use thiserror::Error;

/// Result type alias using Casepilot Error
pub type Result<T> = std::result::Result<T, Error>;

/// Casepilot error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Cannot group rows into test cases: {0}")]
    MissingColumns(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than by
    /// the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFileType(_) | Error::MissingColumns(_) | Error::Spreadsheet(_)
        )
    }
}
