//! Bookkeeping for dispatched commands awaiting their markers

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::LOG_TARGET;
use crate::notify;
use crate::transport::subprocess::UNKNOWN_EXIT_CODE;
use crate::types::identifiers::CommandId;
use crate::types::listener::SharedListener;
use crate::types::result::ShellResult;

/// How a finished command reports back
pub(crate) enum Waiter {
    /// A caller is awaiting `exec`
    Blocking(oneshot::Sender<ShellResult>),
    /// A listener gets the result; `None` falls back to the global listener
    Callback(Option<SharedListener>),
}

/// One dispatched command
pub(crate) struct PendingCommand {
    pub command: String,
    pub waiter: Waiter,
}

impl PendingCommand {
    /// Whether the result goes to a listener rather than an `exec` caller
    pub const fn is_async(&self) -> bool {
        matches!(self.waiter, Waiter::Callback(_))
    }

    /// Give up on a command that never ran
    ///
    /// A blocked `exec` sees its channel close; a listener gets an error
    /// result with the unknown exit status.
    pub fn abandon(self, global: Option<&SharedListener>) {
        match self.waiter {
            Waiter::Blocking(_) => {}
            Waiter::Callback(_) => {
                let result = ShellResult::from_streams(
                    self.command.clone(),
                    UNKNOWN_EXIT_CODE,
                    Vec::new(),
                    Vec::new(),
                );
                self.complete(result, global);
            }
        }
    }

    /// Hand the finished result to whoever is waiting for it
    pub fn complete(self, result: ShellResult, global: Option<&SharedListener>) {
        match self.waiter {
            Waiter::Blocking(tx) => {
                if tx.send(result).is_err() {
                    log::debug!(
                        target: LOG_TARGET,
                        "exec caller stopped waiting for `{}`",
                        self.command
                    );
                }
            }
            Waiter::Callback(listener) => match listener.as_ref().or(global) {
                Some(listener) => {
                    notify::deliver_result(listener.as_ref(), &result);
                }
                None => log::debug!(
                    target: LOG_TARGET,
                    "no listener for async result of `{}`",
                    self.command
                ),
            },
        }
    }
}

/// Dispatched commands keyed by id
///
/// Ordered so that draining yields commands in submission order.
#[derive(Default)]
pub(crate) struct PendingCommands {
    entries: Mutex<BTreeMap<CommandId, PendingCommand>>,
}

impl PendingCommands {
    pub fn insert(&self, id: CommandId, pending: PendingCommand) {
        self.entries.lock().insert(id, pending);
    }

    pub fn remove(&self, id: CommandId) -> Option<PendingCommand> {
        self.entries.lock().remove(&id)
    }

    /// Take every entry, oldest first
    pub fn drain(&self) -> Vec<(CommandId, PendingCommand)> {
        std::mem::take(&mut *self.entries.lock()).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
