//! Transport layer for talking to the interpreter process
//!
//! The interpreter is reached only through its three standard streams:
//! scripts go in on stdin, results come back on stdout and stderr.

pub mod subprocess;

pub use subprocess::{CommandBuilder, Interpreter, exit_code_text};
