//! Lifecycle management for the interpreter subprocess (spawn, shutdown)

use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::LOG_TARGET;
use crate::error::{Result, ShellError};
use crate::protocol::{Stream, StreamEvent};
use crate::types::identifiers::MarkerToken;
use crate::types::options::ShellConfig;

use super::command::CommandBuilder;
use super::config::{EXIT_COMMAND, UNKNOWN_EXIT_CODE};
use super::reader::spawn_reader;
use super::transport::Interpreter;

impl Interpreter {
    /// Spawn the interpreter and start both stream readers
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if process spawning fails or stdio handles cannot be obtained
    pub fn spawn(
        config: &ShellConfig,
        token: &MarkerToken,
    ) -> Result<(Self, mpsc::UnboundedReceiver<StreamEvent>)> {
        config.validate()?;
        let mut cmd = CommandBuilder::new(config).build()?;

        let mut child = cmd.spawn().map_err(|e| {
            if let Some(ref cwd) = config.cwd
                && !cwd.exists()
            {
                return ShellError::spawn(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                ));
            }
            ShellError::spawn(format!(
                "Failed to start `{}`: {e}",
                config.launch_command()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShellError::spawn("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellError::spawn("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShellError::spawn("Failed to get stderr handle"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout_task = spawn_reader(Stream::Output, stdout, token.clone(), tx.clone());
        let stderr_task = spawn_reader(Stream::Error, stderr, token.clone(), tx);

        log::info!(
            target: LOG_TARGET,
            "started interpreter `{}` (pid {:?})",
            config.launch_command(),
            child.id()
        );

        Ok((
            Self {
                process: child,
                stdin: Some(stdin),
                stdout_task,
                stderr_task,
            },
            rx,
        ))
    }

    /// Stop the interpreter and both readers
    ///
    /// When `graceful` is set an `exit` command is written first; otherwise
    /// the input stream is assumed dead and only closed. The process gets
    /// `timeout` to exit before it is killed. Returns the exit status when
    /// one could be collected.
    pub async fn shutdown(&mut self, graceful: bool, timeout: Duration) -> Option<ExitStatus> {
        if let Some(mut stdin) = self.stdin.take() {
            if graceful && let Err(e) = stdin.write_all(EXIT_COMMAND.as_bytes()).await {
                log::debug!(target: LOG_TARGET, "could not send exit to interpreter: {e}");
            }
            let _ = stdin.shutdown().await;
        }

        let status = match tokio::time::timeout(timeout, self.process.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                log::warn!(target: LOG_TARGET, "failed to wait for interpreter: {e}");
                None
            }
            Err(_) => {
                log::warn!(
                    target: LOG_TARGET,
                    "interpreter did not exit within {timeout:?}, killing it"
                );
                let _ = self.process.kill().await;
                self.process.wait().await.ok()
            }
        };

        self.stdout_task.abort();
        self.stderr_task.abort();
        let _ = (&mut self.stdout_task).await;
        let _ = (&mut self.stderr_task).await;

        status
    }

    /// Handle Drop cleanup
    pub(super) fn drop_impl(&mut self) {
        self.stdin.take();
        self.stdout_task.abort();
        self.stderr_task.abort();
        let _ = self.process.start_kill();
    }
}

/// Render an exit status the way a shell reports it in `$?`
#[must_use]
pub fn exit_code_text(status: Option<ExitStatus>) -> String {
    let Some(status) = status else {
        return UNKNOWN_EXIT_CODE.to_string();
    };
    if let Some(code) = status.code() {
        return code.to_string();
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (128 + signal).to_string();
        }
    }
    UNKNOWN_EXIT_CODE.to_string()
}
