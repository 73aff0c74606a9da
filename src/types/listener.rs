//! Listener and gate type definitions
//!
//! This module contains the callback contracts a session reports through:
//! the [`ShellListener`] trait for results and session events, and the
//! [`CommandGate`] predicate that may veto a script before dispatch.

use std::sync::Arc;

// ============================================================================
// Listener Types
// ============================================================================

/// Receiver of command results and session events
///
/// Every method has a no-op default, so implementors override only what they
/// care about. Callbacks run on the session's correlator task; a panic inside
/// one is caught and logged and never reaches the session.
pub trait ShellListener: Send + Sync {
    /// A script finished with exit status `"0"`
    fn output(&self, _command: &str, _exit_code: &str, _outputs: &[String]) {}

    /// A script finished with a non-zero exit status
    fn error(&self, _command: &str, _exit_code: &str, _errors: &[String]) {}

    /// A root availability probe finished
    fn root_result(&self, _has_root: bool, _exit_code: &str) {}

    /// The interpreter broke the marker protocol and is being replaced
    ///
    /// `errors` holds the error-stream lines no command claimed.
    fn broken_pipe(&self, _reason: &str, _errors: &[String]) {}
}

/// Shared listener handle
pub type SharedListener = Arc<dyn ShellListener>;

/// Predicate consulted before each dispatch; returning `false` drops the script
pub type CommandGate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ShellListener for NoopListener {}
