//! Persistent shell sessions
//!
//! A [`ShellSession`] owns one long-lived interpreter process and feeds it
//! scripts over stdin. Results are demultiplexed from stdout and stderr by a
//! pair of reader tasks and a correlator task, then handed either to an
//! awaiting [`exec`](ShellSession::exec) caller or to a listener.
//!
//! # Lifecycle
//!
//! ```text
//! INACTIVE --init--> ACTIVE --close--> INACTIVE
//!                      |  ^
//!     protocol broken  |  |  close + respawn
//!     or interpreter   v  |
//!     exited        ABNORMAL
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rootshell::ShellSession;
//!
//! # async fn example() -> rootshell::Result<()> {
//! let session = ShellSession::obtain(false).await?;
//! let result = session.cmd("echo hello")?.exec().await?;
//! assert_eq!(result.map(|r| r.outputs), Some(vec!["hello".to_string()]));
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod correlator;
mod pending;
mod recovery;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::LOG_TARGET;
use crate::assembler::CommandAssembler;
use crate::error::{Result, ShellError};
use crate::protocol::frame_script;
use crate::transport::Interpreter;
use crate::types::identifiers::{CommandId, MarkerToken};
use crate::types::listener::{CommandGate, SharedListener};
use crate::types::options::ShellConfig;
use crate::types::result::ShellResult;

use correlator::spawn_correlator;
use pending::{PendingCommand, PendingCommands, Waiter};

/// How often `dispatch` rechecks a session whose interpreter just died
const RECOVERY_POLL: Duration = Duration::from_millis(10);

/// Handle to a persistent interpreter session
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct ShellSession {
    inner: Arc<SessionInner>,
}

/// Shared session state
pub(crate) struct SessionInner {
    config: RwLock<ShellConfig>,
    token: MarkerToken,
    assembler: Mutex<CommandAssembler>,
    state: tokio::sync::Mutex<Option<SessionState>>,
    pending: PendingCommands,
    active: AtomicBool,
    next_id: AtomicU64,
    next_generation: AtomicU64,
}

/// One interpreter generation: the process, its readers and its correlator
struct SessionState {
    generation: u64,
    interpreter: Interpreter,
    correlator: JoinHandle<()>,
}

impl SessionState {
    fn is_alive(&mut self) -> bool {
        !self.correlator.is_finished() && self.interpreter.is_alive()
    }

    async fn teardown(mut self, graceful: bool, timeout: Duration) -> Option<std::process::ExitStatus> {
        self.correlator.abort();
        self.interpreter.shutdown(graceful, timeout).await
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        self.correlator.abort();
    }
}

impl SessionInner {
    fn listener(&self) -> Option<SharedListener> {
        self.config.read().listener.clone()
    }

    /// Start a new interpreter generation
    fn spawn_state(self: &Arc<Self>) -> Result<SessionState> {
        let config = self.config.read().clone();
        let (interpreter, events) = Interpreter::spawn(&config, &self.token)?;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let correlator = spawn_correlator(Arc::downgrade(self), generation, events);
        Ok(SessionState {
            generation,
            interpreter,
            correlator,
        })
    }

    /// Consume the assembled script unless the gate vetoes it
    fn take_script(&self) -> Option<String> {
        let script = self.assembler.lock().take()?;
        let gate = self.config.read().command_gate.clone();
        if let Some(gate) = gate
            && !gate(&script)
        {
            log::info!(target: LOG_TARGET, "command gate dropped `{script}`");
            return None;
        }
        Some(script)
    }

    /// Frame and write a script, registering its waiter first
    async fn dispatch(
        self: &Arc<Self>,
        script: String,
        waiter: Waiter,
        asynchronous: bool,
    ) -> Result<CommandId> {
        let mut state = self.state.lock().await;

        // A dead interpreter is about to be replaced by recovery
        let patience = self.config.read().close_timeout;
        let mut waited = Duration::ZERO;
        while waited < patience && state.as_mut().is_some_and(|s| !s.is_alive()) {
            drop(state);
            tokio::time::sleep(RECOVERY_POLL).await;
            waited += RECOVERY_POLL;
            state = self.state.lock().await;
        }

        let auto_init = self.config.read().auto_init;
        if state.is_none() && auto_init {
            log::debug!(target: LOG_TARGET, "initialising inactive session on demand");
            *state = Some(self.spawn_state()?);
            self.active.store(true, Ordering::SeqCst);
        }
        let Some(current) = state.as_mut() else {
            return Err(ShellError::Inactive);
        };

        let id = CommandId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let framed = frame_script(&script, &self.token, id, asynchronous);
        log::debug!(target: LOG_TARGET, "dispatching command {id}: {script}");
        self.pending.insert(
            id,
            PendingCommand {
                command: script,
                waiter,
            },
        );

        if let Err(e) = current.interpreter.write(&framed).await {
            self.pending.remove(id);
            log::error!(target: LOG_TARGET, "failed to dispatch command {id}: {e}");
            return Err(e);
        }
        Ok(id)
    }
}

impl ShellSession {
    /// Create a session without starting the interpreter
    #[must_use]
    pub fn new(config: ShellConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config: RwLock::new(config),
                token: MarkerToken::generate(),
                assembler: Mutex::new(CommandAssembler::new()),
                state: tokio::sync::Mutex::new(None),
                pending: PendingCommands::default(),
                active: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Create and start a session with default configuration
    ///
    /// # Errors
    /// Returns error if the interpreter cannot be spawned
    pub async fn obtain(root: bool) -> Result<Self> {
        let session = Self::new(ShellConfig::builder().root(root).build());
        session.init().await?;
        Ok(session)
    }

    /// Start the interpreter; a no-op while the session is already active
    ///
    /// A session whose interpreter died is torn down and restarted.
    ///
    /// # Errors
    /// Returns error if the interpreter cannot be spawned
    pub async fn init(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if let Some(current) = state.as_mut() {
            if current.is_alive() {
                log::debug!(target: LOG_TARGET, "init on active session ignored");
                return Ok(());
            }
            let close_timeout = self.inner.config.read().close_timeout;
            if let Some(stale) = state.take() {
                stale.teardown(false, close_timeout).await;
            }
            let abandoned = self.inner.pending.drain();
            if !abandoned.is_empty() {
                log::warn!(
                    target: LOG_TARGET,
                    "dropping {} command(s) of a dead interpreter",
                    abandoned.len()
                );
            }
        }

        *state = Some(self.inner.spawn_state()?);
        self.inner.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Replace the launch command used by the next spawn
    pub fn set_shell_commands(&self, entry: impl Into<String>, fallback: impl Into<String>) {
        self.inner.config.write().shell_commands = [entry.into(), fallback.into()];
    }

    /// Replace or remove the global listener
    pub fn set_listener(&self, listener: Option<SharedListener>) {
        self.inner.config.write().listener = listener;
    }

    /// Replace or remove the dispatch gate
    pub fn set_command_gate(&self, gate: Option<CommandGate>) {
        self.inner.config.write().command_gate = gate;
    }

    /// Accumulate subsequent `cmd` calls into one script until the next submission
    pub fn enable_splicing_mode(&self) -> &Self {
        self.inner.assembler.lock().enable_splicing();
        self
    }

    /// Queue script text for the next [`exec`](Self::exec) or [`exec_async`](Self::exec_async)
    ///
    /// Blank text is ignored. Queueing works while the session is
    /// recovering, including from a `broken_pipe` callback.
    ///
    /// # Errors
    /// Returns [`ShellError::Inactive`] when the session is not active and
    /// `auto_init` is off
    pub fn cmd(&self, text: impl Into<String>) -> Result<&Self> {
        let auto_init = self.inner.config.read().auto_init;
        if !self.inner.active.load(Ordering::SeqCst) && !auto_init {
            return Err(ShellError::Inactive);
        }
        let text = text.into();
        if text.trim().is_empty() {
            log::debug!(target: LOG_TARGET, "ignoring blank command");
            return Ok(self);
        }
        self.inner.assembler.lock().push(text);
        Ok(self)
    }

    /// Run the queued script and wait for its result
    ///
    /// Returns `Ok(None)` when nothing was queued or the gate dropped the
    /// script. Without an `exec_timeout` this waits as long as the script runs.
    ///
    /// # Errors
    /// Returns error if the session is inactive, the write fails, the
    /// timeout elapses, or the session is closed while waiting
    pub async fn exec(&self) -> Result<Option<ShellResult>> {
        let Some(script) = self.inner.take_script() else {
            return Ok(None);
        };

        let (tx, rx) = oneshot::channel();
        let id = self
            .inner
            .dispatch(script.clone(), Waiter::Blocking(tx), false)
            .await?;

        let exec_timeout = self.inner.config.read().exec_timeout;
        let received = match exec_timeout {
            Some(limit) => {
                if let Ok(received) = tokio::time::timeout(limit, rx).await {
                    received
                } else {
                    self.inner.pending.remove(id);
                    return Err(ShellError::timeout(format!(
                        "`{script}` did not complete within {limit:?}"
                    )));
                }
            }
            None => rx.await,
        };

        received.map(Some).map_err(|_| ShellError::closed(script))
    }

    /// Run the queued script without waiting
    ///
    /// The result goes to `listener`, or to the global listener when `None`.
    /// Returns the id of the dispatched command, or `None` when nothing was
    /// queued or the gate dropped the script.
    ///
    /// # Errors
    /// Returns error if the session is inactive or the write fails
    pub async fn exec_async(&self, listener: Option<SharedListener>) -> Result<Option<CommandId>> {
        let Some(script) = self.inner.take_script() else {
            return Ok(None);
        };
        let id = self
            .inner
            .dispatch(script, Waiter::Callback(listener), true)
            .await?;
        Ok(Some(id))
    }

    /// Whether the interpreter is running and both readers are healthy
    pub async fn is_active(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        let alive = state.as_mut().is_some_and(SessionState::is_alive);
        alive && self.inner.active.load(Ordering::SeqCst)
    }

    /// Process id of the current interpreter
    pub async fn pid(&self) -> Option<u32> {
        let state = self.inner.state.lock().await;
        state.as_ref().and_then(|s| s.interpreter.pid())
    }

    /// Number of dispatched commands still awaiting completion
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.pending.len()
    }

    /// Stop the interpreter and release its resources
    ///
    /// Pending `exec` callers fail with [`ShellError::Closed`]; pending async
    /// commands are dropped. Safe to call on an inactive session.
    ///
    /// # Errors
    /// Currently returns Ok in all cases, but is Result for API consistency
    pub async fn close(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let Some(mut current) = state.take() else {
            return Ok(());
        };
        self.inner.active.store(false, Ordering::SeqCst);

        // Stop correlating before our own exit produces EOFs
        current.correlator.abort();
        let graceful = current.interpreter.is_alive();
        let close_timeout = self.inner.config.read().close_timeout;
        let status = current.teardown(graceful, close_timeout).await;
        log::info!(target: LOG_TARGET, "interpreter closed with {status:?}");

        let abandoned = self.inner.pending.drain();
        if !abandoned.is_empty() {
            log::debug!(
                target: LOG_TARGET,
                "closing with {} command(s) in flight",
                abandoned.len()
            );
        }
        self.inner.assembler.lock().clear();
        Ok(())
    }
}

impl std::fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellSession")
            .field("config", &*self.inner.config.read())
            .field("active", &self.inner.active.load(Ordering::SeqCst))
            .field("in_flight", &self.inner.pending.len())
            .finish_non_exhaustive()
    }
}
