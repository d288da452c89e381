use crate::env::Environment;
use crate::jobs::JobRegistry;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Object-safe trait for any built-in command that can be executed by the shell.
///
/// Built-ins run in-process; they write user-visible output to `out` and may
/// mutate the session environment and the background-job registry.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(
        self: Box<Self>,
        out: &mut dyn Write,
        env: &mut Environment,
        jobs: &mut JobRegistry,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`, in which
/// case the dispatcher falls through to launching an external process.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
