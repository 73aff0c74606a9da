//! Automatic replacement of a broken or exited interpreter

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::SessionInner;
use super::pending::PendingCommand;
use crate::LOG_TARGET;
use crate::notify;
use crate::protocol::{InterpreterExit, frame_script};
use crate::transport::exit_code_text;
use crate::types::identifiers::CommandId;
use crate::types::result::ShellResult;

impl SessionInner {
    /// Replace the interpreter of `generation` with a fresh one
    ///
    /// Commands are settled by how far they got on the old interpreter:
    ///
    /// - seen on one stream only: completed from their own marker
    /// - the command running when it stopped: completed with the
    ///   interpreter's exit status and the lines no marker claimed
    /// - queued behind it: written again to the new interpreter under the
    ///   same id, or abandoned when that is impossible
    ///
    /// The session stays active throughout, so `cmd` keeps queueing and
    /// `dispatch` waits on the state lock held here. A stale generation is
    /// ignored.
    pub(super) async fn recover(self: Arc<Self>, generation: u64, exit: InterpreterExit) {
        let mut state = self.state.lock().await;
        if state.as_ref().map(|s| s.generation) != Some(generation) {
            log::debug!(
                target: LOG_TARGET,
                "skipping recovery of stale interpreter generation {generation}"
            );
            return;
        }

        let InterpreterExit {
            broken_pipe,
            unclaimed_output,
            unclaimed_errors,
            partial,
        } = exit;
        let mut partial: HashMap<CommandId, _> = partial.into_iter().map(|c| (c.id, c)).collect();

        let mut settled = Vec::new();
        let mut running = None;
        let mut queued = Vec::new();
        for (id, pending) in self.pending.drain() {
            if let Some(seen) = partial.remove(&id) {
                let result = ShellResult::from_streams(
                    pending.command.clone(),
                    seen.exit_code,
                    seen.outputs,
                    seen.errors,
                );
                settled.push((pending, result));
            } else if running.is_none() {
                running = Some(pending);
            } else {
                queued.push((id, pending));
            }
        }

        if broken_pipe {
            let reason = match &running {
                Some(pending) => format!(
                    "interpreter wrote to stderr outside the marker protocol and closed it while running: {}",
                    pending.command
                ),
                None => {
                    "interpreter wrote to stderr outside the marker protocol and closed it".to_string()
                }
            };
            log::warn!(target: LOG_TARGET, "broken pipe: {reason}");
            if let Some(listener) = self.listener() {
                notify::deliver(listener.as_ref(), "broken_pipe", |l| {
                    l.broken_pipe(&reason, &unclaimed_errors);
                });
            }
        }

        let close_timeout = self.config.read().close_timeout;
        let status = match state.take() {
            Some(old) => old.teardown(false, close_timeout).await,
            None => None,
        };
        let exit_code = exit_code_text(status);

        let abandoned = match self.spawn_state() {
            Ok(mut fresh) => {
                let mut abandoned = Vec::new();
                for (id, pending) in queued {
                    let framed = frame_script(&pending.command, &self.token, id, pending.is_async());
                    self.pending.insert(id, pending);
                    match fresh.interpreter.write(&framed).await {
                        Ok(()) => {
                            log::debug!(target: LOG_TARGET, "re-dispatched command {id} after recovery");
                        }
                        Err(e) => {
                            log::error!(target: LOG_TARGET, "failed to re-dispatch command {id}: {e}");
                            abandoned.extend(self.pending.remove(id));
                        }
                    }
                }
                *state = Some(fresh);
                self.active.store(true, Ordering::SeqCst);
                log::info!(target: LOG_TARGET, "interpreter recovered after exit status {exit_code}");
                abandoned
            }
            Err(e) => {
                log::error!(target: LOG_TARGET, "failed to restart interpreter: {e}");
                self.active.store(false, Ordering::SeqCst);
                queued.into_iter().map(|(_, pending)| pending).collect::<Vec<PendingCommand>>()
            }
        };
        drop(state);

        let global = self.listener();
        for (pending, result) in settled {
            pending.complete(result, global.as_ref());
        }
        if let Some(pending) = running {
            let result = ShellResult::from_streams(
                pending.command.clone(),
                exit_code,
                unclaimed_output,
                unclaimed_errors,
            );
            pending.complete(result, global.as_ref());
        }
        for pending in abandoned {
            log::warn!(
                target: LOG_TARGET,
                "abandoning `{}`: no interpreter to run it",
                pending.command
            );
            pending.abandon(global.as_ref());
        }
    }
}
