//! Interpreter subprocess transport
//!
//! Spawns the command interpreter with piped stdio and runs one reader task
//! per output stream.

mod command;
mod config;
mod lifecycle;
mod reader;
mod transport;

// Re-export public types
pub use command::CommandBuilder;
pub use config::{DANGEROUS_ENV_VARS, EXIT_COMMAND, UNKNOWN_EXIT_CODE};
pub use lifecycle::exit_code_text;
pub use reader::spawn_reader;
pub use transport::Interpreter;
