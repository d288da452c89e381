use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::jobs::JobRegistry;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env as stdenv;
use std::io::{ErrorKind, Write};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "exit".
    fn name() -> &'static str;

    /// Alternate names the command also answers to.
    fn aliases() -> &'static [&'static str] {
        &[]
    }

    /// Executes the command using the provided output stream and session state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        out: &mut dyn Write,
        env: &mut Environment,
        jobs: &mut JobRegistry,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        out: &mut dyn Write,
        env: &mut Environment,
        jobs: &mut JobRegistry,
    ) -> Result<ExitCode> {
        match T::execute(*self, out, env, jobs) {
            Ok(x) => Ok(x),
            Err(e) => {
                eprintln!("{e}");
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        out: &mut dyn Write,
        _env: &mut Environment,
        _jobs: &mut JobRegistry,
    ) -> Result<ExitCode> {
        out.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() || T::aliases().contains(&name) {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// Write one line per live background job: slot, pid and program name.
fn print_jobs(jobs: &mut JobRegistry, out: &mut dyn Write) -> std::io::Result<()> {
    for (slot, pid, name) in jobs.list() {
        writeln!(out, "\t\t[{slot}] {pid}\t{name}")?;
    }
    Ok(())
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        out: &mut dyn Write,
        env: &mut Environment,
        _jobs: &mut JobRegistry,
    ) -> Result<ExitCode> {
        writeln!(out, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _out: &mut dyn Write,
        env: &mut Environment,
        _jobs: &mut JobRegistry,
    ) -> Result<ExitCode> {
        let Some(target) = &self.target else {
            return Err(anyhow!("Please specify a directory parameter when using cd"));
        };

        match stdenv::set_current_dir(target) {
            Ok(()) => {
                env.current_dir = stdenv::current_dir()
                    .context("changed directory but could not read the new location")?;
                Ok(0)
            }
            Err(err) => {
                let reason = match err.kind() {
                    ErrorKind::NotFound => {
                        "A component of the path does not name an existing directory"
                    }
                    ErrorKind::PermissionDenied => {
                        "Search permission are denied for any component of the pathname."
                    }
                    ErrorKind::NotADirectory => "A component of the path is not a directory.",
                    _ => "Unhandled error.",
                };
                Err(anyhow!("Error running builtin \"cd {target}\", {reason}"))
            }
        }
    }
}

#[derive(FromArgs)]
/// Quit the shell. Refused while background tasks are still running.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        out: &mut dyn Write,
        env: &mut Environment,
        jobs: &mut JobRegistry,
    ) -> Result<ExitCode> {
        print_jobs(jobs, out)?;
        let live = jobs.reap_all();
        if live != 0 {
            writeln!(out, "There's still {live} background(s) process(es) running")?;
        } else {
            env.should_exit = true;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the tasks currently running in the background.
pub struct Btasks {}

impl BuiltinCommand for Btasks {
    fn name() -> &'static str {
        "btasks"
    }

    fn aliases() -> &'static [&'static str] {
        &["ap"]
    }

    fn execute(
        self,
        out: &mut dyn Write,
        _env: &mut Environment,
        jobs: &mut JobRegistry,
    ) -> Result<ExitCode> {
        print_jobs(jobs, out)?;
        Ok(0)
    }
}
