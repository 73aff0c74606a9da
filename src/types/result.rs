//! Completed command results

use serde::{Deserialize, Serialize};

/// Exit status text reported for a successful script
pub const SUCCESS_EXIT_CODE: &str = "0";

/// Outcome of one dispatched script
///
/// `outputs` carries the standard-output lines when `exit_code` is `"0"`;
/// otherwise `errors` carries the standard-error lines and `outputs` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellResult {
    /// The script text as submitted
    pub command: String,
    /// Exit status of the script, as printed by the interpreter
    pub exit_code: String,
    /// Standard-output lines (successful scripts only)
    pub outputs: Vec<String>,
    /// Standard-error lines (failed scripts only)
    pub errors: Vec<String>,
}

impl ShellResult {
    /// Build a result, routing captured lines by exit status
    #[must_use]
    pub fn from_streams(
        command: impl Into<String>,
        exit_code: impl Into<String>,
        outputs: Vec<String>,
        errors: Vec<String>,
    ) -> Self {
        let exit_code = exit_code.into();
        let (outputs, errors) = if exit_code == SUCCESS_EXIT_CODE {
            (outputs, Vec::new())
        } else {
            (Vec::new(), errors)
        };
        Self {
            command: command.into(),
            exit_code,
            outputs,
            errors,
        }
    }

    /// Whether the script exited with status zero
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == SUCCESS_EXIT_CODE
    }

    /// Numeric exit status, if the interpreter reported one
    #[must_use]
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_code.parse().ok()
    }
}
