//! # rootshell
//!
//! Persistent privileged shell sessions for Rust. A session spawns one
//! long-lived command interpreter (`su` or `sh`), feeds it scripts over stdin
//! and demultiplexes interleaved stdout/stderr back into per-command results.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rootshell::ShellSession;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ShellSession::obtain(true).await?;
//!
//!     if let Some(result) = session.cmd("id -u")?.exec().await? {
//!         log::info!("uid: {:?} (exit {})", result.outputs, result.exit_code);
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Awaited execution with [`ShellSession::exec`]
//!
//! `exec` resolves once the script's completion marker has been read from
//! both standard output and standard error. Successful scripts report their
//! stdout lines in `outputs`; failing scripts report stderr lines in `errors`.
//!
//! ### 2. Callback execution with [`ShellSession::exec_async`]
//!
//! ```no_run
//! # use rootshell::{ShellListener, ShellSession};
//! # use std::sync::Arc;
//! struct Printer;
//!
//! impl ShellListener for Printer {
//!     fn output(&self, command: &str, _exit_code: &str, outputs: &[String]) {
//!         log::info!("{command}: {outputs:?}");
//!     }
//! }
//!
//! # async fn example(session: ShellSession) -> rootshell::Result<()> {
//! session.cmd("ls /data")?.exec_async(Some(Arc::new(Printer))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### 3. Splicing
//!
//! ```no_run
//! # async fn example(session: rootshell::ShellSession) -> rootshell::Result<()> {
//! session.enable_splicing_mode();
//! session.cmd("cd /data")?.cmd("ls")?;
//! let listing = session.exec().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### 4. Automatic recovery
//!
//! When the interpreter writes to stderr outside the marker protocol and
//! closes it, or simply exits, the session reports a broken pipe to the
//! global listener (for the former) and restarts the interpreter. The
//! command that was running completes with the interpreter's exit status;
//! commands queued behind it are sent again to the new interpreter.
//!
//! ### 5. Root probing with [`RootProbe`]
//!
//! ```no_run
//! # async fn example() {
//! let has_root = rootshell::RootProbe::new().check().await;
//! # }
//! ```

pub mod assembler;
pub mod error;
pub mod notify;
pub mod probe;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

pub use assembler::CommandAssembler;
pub use error::{Result, ShellError};
pub use probe::{RootCheck, RootProbe};
pub use session::ShellSession;
pub use types::{
    CommandGate, CommandId, MarkerToken, NoopListener, SharedListener, ShellConfig,
    ShellConfigBuilder, ShellListener, ShellResult,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log target used for every message this crate emits
pub const LOG_TARGET: &str = "rootshell";
