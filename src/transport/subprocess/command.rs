//! Launch command building for the interpreter subprocess

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Result, ShellError};
use crate::types::options::ShellConfig;

use super::config::DANGEROUS_ENV_VARS;

/// Command builder for the interpreter
pub struct CommandBuilder<'a> {
    config: &'a ShellConfig,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(config: &'a ShellConfig) -> Self {
        Self { config }
    }

    /// Build the interpreter command with piped stdio
    ///
    /// The launch command may carry arguments (`"su -c sh"`); the first word
    /// is resolved on `PATH` and the rest are passed through.
    ///
    /// # Errors
    /// Returns error if the launch command is empty
    pub fn build(&self) -> Result<Command> {
        let launch = self.config.launch_command();
        let mut words = launch.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| ShellError::invalid_config("launch command is empty"))?;

        let mut cmd = Command::new(Self::resolve(program));
        cmd.args(words);

        for (key, value) in &self.config.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                log::warn!(
                    target: crate::LOG_TARGET,
                    "refusing to pass {key} to the interpreter"
                );
                continue;
            }
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.config.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(cmd)
    }

    /// Find the program on `PATH`, falling back to the bare name
    #[must_use]
    pub fn resolve(program: &str) -> PathBuf {
        which::which(program).unwrap_or_else(|_| PathBuf::from(program))
    }
}
