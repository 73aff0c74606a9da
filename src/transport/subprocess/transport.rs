//! Interpreter subprocess handle

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;

use crate::error::{Result, ShellError};

/// One live interpreter process with its two stream readers
///
/// Created by [`Interpreter::spawn`]; the readers' events go to the
/// receiver returned alongside it.
pub struct Interpreter {
    pub(super) process: Child,
    pub(super) stdin: Option<ChildStdin>,
    pub(super) stdout_task: JoinHandle<()>,
    pub(super) stderr_task: JoinHandle<()>,
}

impl Interpreter {
    /// Write a framed script to the interpreter's input stream
    ///
    /// # Errors
    /// Returns error if the input stream is closed or the write fails
    pub async fn write(&mut self, data: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ShellError::transport("stdin not available"))?;

        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| ShellError::transport(format!("Failed to write to stdin: {e}")))?;

        stdin
            .flush()
            .await
            .map_err(|e| ShellError::transport(format!("Failed to flush stdin: {e}")))?;

        Ok(())
    }

    /// Whether the process is running and both readers are still reading
    pub fn is_alive(&mut self) -> bool {
        let running = matches!(self.process.try_wait(), Ok(None));
        running && !self.stdout_task.is_finished() && !self.stderr_task.is_finished()
    }

    /// OS process id, while the process has not been reaped
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
