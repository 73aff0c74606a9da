//! Shell session options and configuration
//!
//! This module contains the configuration for a [`ShellSession`](crate::ShellSession),
//! including a builder pattern for easy configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::listener::{CommandGate, SharedListener};
use crate::error::{Result, ShellError};

/// Default launch command: privileged entry, then the plain-shell fallback
pub const DEFAULT_SHELL_COMMANDS: [&str; 2] = ["su", "sh"];

/// Default time `close` waits for the interpreter to exit before killing it
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Shell Config
// ============================================================================

/// Main options for a shell session
#[derive(Clone)]
pub struct ShellConfig {
    /// Launch the privileged entry instead of the plain-shell fallback
    pub root: bool,
    /// Two-element launch command: `[privileged entry, fallback]`
    pub shell_commands: [String; 2],
    /// Global listener for results, root probes and broken pipes
    pub listener: Option<SharedListener>,
    /// Predicate that may veto scripts before dispatch
    pub command_gate: Option<CommandGate>,
    /// Upper bound for `exec`; `None` waits forever
    pub exec_timeout: Option<Duration>,
    /// Graceful-exit wait in `close` before the interpreter is killed
    pub close_timeout: Duration,
    /// Initialise an inactive session on demand instead of failing
    pub auto_init: bool,
    /// Working directory for the interpreter
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the interpreter
    pub env: HashMap<String, String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            root: false,
            shell_commands: DEFAULT_SHELL_COMMANDS.map(str::to_string),
            listener: None,
            command_gate: None,
            exec_timeout: None,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            auto_init: false,
            cwd: None,
            env: HashMap::new(),
        }
    }
}

impl ShellConfig {
    /// Create a new builder for `ShellConfig`
    #[must_use]
    pub fn builder() -> ShellConfigBuilder {
        ShellConfigBuilder::default()
    }

    /// The launch command selected by the root flag
    #[must_use]
    pub fn launch_command(&self) -> &str {
        if self.root {
            &self.shell_commands[0]
        } else {
            &self.shell_commands[1]
        }
    }

    /// Check the configuration for values the interpreter cannot be started with
    ///
    /// # Errors
    /// Returns error if either launch command is blank
    pub fn validate(&self) -> Result<()> {
        if self.shell_commands.iter().any(|c| c.trim().is_empty()) {
            return Err(ShellError::invalid_config(
                "shell commands must not be empty",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ShellConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellConfig")
            .field("root", &self.root)
            .field("shell_commands", &self.shell_commands)
            .field("listener", &self.listener.as_ref().map(|_| "<listener>"))
            .field("command_gate", &self.command_gate.as_ref().map(|_| "<gate>"))
            .field("exec_timeout", &self.exec_timeout)
            .field("close_timeout", &self.close_timeout)
            .field("auto_init", &self.auto_init)
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .finish()
    }
}

// ============================================================================
// Builder for ShellConfig
// ============================================================================

/// Builder for `ShellConfig`
#[derive(Debug, Default)]
pub struct ShellConfigBuilder {
    options: ShellConfig,
}

impl ShellConfigBuilder {
    /// Select privileged or plain mode
    #[must_use]
    pub const fn root(mut self, root: bool) -> Self {
        self.options.root = root;
        self
    }

    /// Set the two-element launch command
    #[must_use]
    pub fn shell_commands(mut self, entry: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.options.shell_commands = [entry.into(), fallback.into()];
        self
    }

    /// Set the global listener
    #[must_use]
    pub fn listener(mut self, listener: SharedListener) -> Self {
        self.options.listener = Some(listener);
        self
    }

    /// Set the dispatch gate
    #[must_use]
    pub fn command_gate<F>(mut self, gate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.options.command_gate = Some(std::sync::Arc::new(gate));
        self
    }

    /// Bound how long `exec` waits for a result
    #[must_use]
    pub const fn exec_timeout(mut self, timeout: Duration) -> Self {
        self.options.exec_timeout = Some(timeout);
        self
    }

    /// Set the graceful-exit wait used by `close`
    #[must_use]
    pub const fn close_timeout(mut self, timeout: Duration) -> Self {
        self.options.close_timeout = timeout;
        self
    }

    /// Initialise inactive sessions on demand
    #[must_use]
    pub const fn auto_init(mut self, auto_init: bool) -> Self {
        self.options.auto_init = auto_init;
        self
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> ShellConfig {
        self.options
    }
}
