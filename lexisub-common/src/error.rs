//! Common error types for lexisub

use thiserror::Error;

/// Common result type for lexisub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across lexisub services
#[derive(Error, Debug)]
pub enum Error {
    /// Requested resource not found (video file, subtitle file)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream collaborator unreachable or erroring
    /// (transcription endpoint, knowledge store)
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Task id already registered
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    /// Task id not present in the registry
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Update rejected because the task record is terminal
    #[error("Task is in a terminal state: {0}")]
    TerminalState(String),

    /// Subtitle document could not be parsed
    #[error("Subtitle parse error: {0}")]
    Subtitle(String),

    /// Send to a client connection failed
    #[error("Connection send failed: {0}")]
    ConnectionSend(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
