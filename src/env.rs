use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the shell session used by the interpreter.
///
/// The environment contains:
/// - `current_dir`: a cache of the process working directory, refreshed by the
///   `cd` built-in after a successful directory change.
/// - `should_exit`: a flag that the REPL loop checks to know when to terminate.
///
/// Launched commands inherit the real process environment and working
/// directory, so no variable map is kept here.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The current working directory, as last observed.
    pub current_dir: PathBuf,
    /// When set to true, indicates that the interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// Initializes `current_dir` from `std::env::current_dir()` and the
    /// `should_exit` flag to `false`.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            should_exit: false,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
