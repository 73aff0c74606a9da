//! Isolated listener dispatch
//!
//! Listener callbacks run on the correlator task. A misbehaving listener must
//! not take that task down, so every callback goes through [`deliver`], which
//! catches panics and logs them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::LOG_TARGET;
use crate::types::listener::ShellListener;
use crate::types::result::ShellResult;

/// Invoke one listener callback, catching and logging any panic
///
/// Returns `false` when the callback panicked.
pub fn deliver<F>(listener: &dyn ShellListener, event: &str, callback: F) -> bool
where
    F: FnOnce(&dyn ShellListener),
{
    match panic::catch_unwind(AssertUnwindSafe(|| callback(listener))) {
        Ok(()) => true,
        Err(payload) => {
            log::error!(
                target: LOG_TARGET,
                "listener panicked in {event} callback: {}",
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

/// Route a completed result to `output` or `error` by its exit status
pub fn deliver_result(listener: &dyn ShellListener, result: &ShellResult) -> bool {
    if result.is_success() {
        deliver(listener, "output", |l| {
            l.output(&result.command, &result.exit_code, &result.outputs);
        })
    } else {
        deliver(listener, "error", |l| {
            l.error(&result.command, &result.exit_code, &result.errors);
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
