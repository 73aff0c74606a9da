//! Correlator task joining the two stream readers
//!
//! Both readers send their events into one channel; this task feeds them to a
//! [`Demultiplexer`] and delivers each completed command to its waiter. When
//! the interpreter stops honouring the protocol it hands over to recovery and
//! exits.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionInner;
use crate::LOG_TARGET;
use crate::protocol::{Completion, Demultiplexer, Step, StreamEvent};
use crate::types::result::ShellResult;

/// Spawn the correlator for one interpreter generation
pub(super) fn spawn_correlator(
    inner: Weak<SessionInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut demux = Demultiplexer::new();

        while let Some(event) = events.recv().await {
            let Some(session) = inner.upgrade() else {
                return;
            };
            match demux.handle(event) {
                Step::Waiting => {}
                Step::Completed(completion) => deliver(&session, completion),
                Step::InterpreterGone(exit) => {
                    log::warn!(
                        target: LOG_TARGET,
                        "interpreter generation {generation} stopped (broken pipe: {})",
                        exit.broken_pipe
                    );
                    tokio::spawn(session.recover(generation, exit));
                    return;
                }
            }
        }
    })
}

fn deliver(session: &Arc<SessionInner>, completion: Completion) {
    let Some(pending) = session.pending.remove(completion.id) else {
        log::debug!(
            target: LOG_TARGET,
            "no waiter for command {} (timed out or closed)",
            completion.id
        );
        return;
    };

    if completion.asynchronous != pending.is_async() {
        log::debug!(
            target: LOG_TARGET,
            "marker mode for command {} disagrees with its waiter",
            completion.id
        );
    }

    let result = ShellResult::from_streams(
        pending.command.clone(),
        completion.exit_code,
        completion.outputs,
        completion.errors,
    );
    let global = session.listener();
    pending.complete(result, global.as_ref());
}
