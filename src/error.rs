//! Error types for shell sessions

use thiserror::Error;

/// Main error type for shell sessions
#[derive(Error, Debug)]
pub enum ShellError {
    /// The interpreter process could not be started
    #[error("Failed to spawn interpreter: {0}")]
    Spawn(String),

    /// Operation requires an active session
    #[error("Shell session is not active")]
    Inactive,

    /// Writing to or reading from the interpreter streams failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A command did not complete within the configured bound
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The session was closed while a caller was waiting for a result
    #[error("Shell session closed before command completed: {0}")]
    Closed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for shell session operations
pub type Result<T> = std::result::Result<T, ShellError>;

impl ShellError {
    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a closed error carrying the command that was abandoned
    pub fn closed(command: impl Into<String>) -> Self {
        Self::Closed(command.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the error means the caller hit an inactive session
    #[must_use]
    pub const fn is_inactive(&self) -> bool {
        matches!(self, Self::Inactive)
    }
}
