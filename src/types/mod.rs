//! Type definitions for shell sessions
//!
//! - [`identifiers`] - Type-safe wrappers (`CommandId`, `MarkerToken`)
//! - [`listener`] - Listener trait and dispatch gate
//! - [`options`] - Session configuration
//! - [`result`] - Completed command results

pub mod identifiers;
pub mod listener;
pub mod options;
pub mod result;

pub use identifiers::{CommandId, MarkerToken};
pub use listener::{CommandGate, NoopListener, SharedListener, ShellListener};
pub use options::{ShellConfig, ShellConfigBuilder};
pub use result::ShellResult;
