//! Configuration constants for the interpreter subprocess

/// Dangerous environment variables that are never passed to the interpreter
///
/// These variables can affect how the interpreter loads and executes code,
/// which matters doubly when it runs privileged.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "IFS",
    "ENV",
    "BASH_ENV",
];

/// Command written to the interpreter on graceful close
pub const EXIT_COMMAND: &str = "exit\n";

/// Exit status text used when the interpreter's status cannot be determined
pub const UNKNOWN_EXIT_CODE: &str = "-1";
