//! Root availability probe
//!
//! Spawns a throwaway privileged process, asks it to exit, and reports
//! whether it exited cleanly. The process is killed on every path.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::LOG_TARGET;
use crate::notify;
use crate::transport::{CommandBuilder, exit_code_text};
use crate::types::listener::SharedListener;
use crate::types::options::DEFAULT_SHELL_COMMANDS;
use crate::types::result::SUCCESS_EXIT_CODE;

/// Default upper bound for one probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCheck {
    /// Whether the privileged process exited with status zero
    pub has_root: bool,
    /// Exit status text (`-1` when the process could not be run)
    pub exit_code: String,
}

/// One-shot check for privileged shell access
#[derive(Clone)]
pub struct RootProbe {
    command: String,
    listener: Option<SharedListener>,
    timeout: Duration,
}

impl Default for RootProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl RootProbe {
    /// Probe with the default privileged entry (`su`)
    #[must_use]
    pub fn new() -> Self {
        Self {
            command: DEFAULT_SHELL_COMMANDS[0].to_string(),
            listener: None,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Use a different privileged entry command
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Report each outcome to `listener.root_result`
    #[must_use]
    pub fn listener(mut self, listener: SharedListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Bound how long the privileged process may take
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the probe and wait for it
    pub async fn check(&self) -> bool {
        let outcome = self.run().await;
        if let Some(ref listener) = self.listener {
            notify::deliver(listener.as_ref(), "root_result", |l| {
                l.root_result(outcome.has_root, &outcome.exit_code);
            });
        }
        outcome.has_root
    }

    /// Run the probe in the background
    ///
    /// The handle resolves to the same value [`check`](Self::check) returns;
    /// the listener, if any, is told as soon as the probe finishes.
    #[must_use]
    pub fn check_detached(&self) -> JoinHandle<bool> {
        let probe = self.clone();
        tokio::spawn(async move { probe.check().await })
    }

    /// Run the probe and return the full outcome
    pub async fn run(&self) -> RootCheck {
        let mut words = self.command.split_whitespace();
        let Some(program) = words.next() else {
            return Self::failed("empty probe command");
        };

        let mut child = match Command::new(CommandBuilder::resolve(program))
            .args(words)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return Self::failed(&format!("failed to spawn `{}`: {e}", self.command)),
        };

        if let Some(mut stdin) = child.stdin.take() {
            // The probe may exit before reading; a broken pipe here is expected
            let _ = stdin.write_all(b"exit\n").await;
            let _ = stdin.shutdown().await;
        }

        let outcome = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let exit_code = exit_code_text(Some(status));
                RootCheck {
                    has_root: exit_code == SUCCESS_EXIT_CODE,
                    exit_code,
                }
            }
            Ok(Err(e)) => Self::failed(&format!("failed to wait for `{}`: {e}", self.command)),
            Err(_) => Self::failed(&format!(
                "`{}` did not exit within {:?}",
                self.command, self.timeout
            )),
        };

        let _ = child.start_kill();
        log::debug!(
            target: LOG_TARGET,
            "root probe `{}` finished: {outcome:?}",
            self.command
        );
        outcome
    }

    fn failed(reason: &str) -> RootCheck {
        log::warn!(target: LOG_TARGET, "root probe failed: {reason}");
        RootCheck {
            has_root: false,
            exit_code: crate::transport::subprocess::UNKNOWN_EXIT_CODE.to_string(),
        }
    }
}

impl std::fmt::Debug for RootProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootProbe")
            .field("command", &self.command)
            .field("listener", &self.listener.as_ref().map(|_| "<listener>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
