use crate::command::ExitCode;
use crate::jobs::JobRegistry;
use crate::stats::{ExecutionOutcome, Statistics};
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execvp, fork};
use std::ffi::CString;
use std::io::Write;
use std::process;
use thiserror::Error;

/// A failure while launching an external command.
///
/// Each level of the spawn protocol has its own variant: `Launch` is the
/// shell's own fork, `Spawn` the intermediate's fork, `Exec` the grandchild's
/// `execvp`. Only `Launch`, `Wait` and the argument errors can reach the
/// shell; `Spawn` and `Exec` happen in the child processes, which print the
/// diagnostic themselves and exit.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Couldn't fork the program, please retry.")]
    Launch(#[source] Errno),
    #[error("Couldn't fork the child process")]
    Spawn(#[source] Errno),
    #[error("Error no: {0} during execution of command, did you type correctly.")]
    Exec(i32),
    #[error("failed to wait for launched command")]
    Wait(#[source] Errno),
    #[error("empty command")]
    EmptyCommand,
    #[error("argument contains an interior NUL byte: {0:?}")]
    InvalidArgument(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How a successful launch ended, from the shell's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// The command ran to completion; carries the supervisor's exit code.
    Foreground(ExitCode),
    /// The command was detached; carries the supervisor's pid, which is what
    /// the job registry tracks.
    Background(Pid),
}

/// Launches external commands through a two-level spawn protocol.
///
/// The shell forks an intermediate supervisor, which forks the grandchild
/// that actually execs the command. The supervisor waits for the grandchild
/// in every case and renders run statistics from its own
/// `getrusage(RUSAGE_CHILDREN)`, which is scoped to exactly that one child.
/// The shell itself therefore only ever waits on supervisors: blocking for a
/// foreground run, or recording the supervisor in the job registry for a
/// background one.
#[derive(Debug, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    /// Launch `argv`, blocking until completion unless `background` is set.
    ///
    /// Background launches are recorded in `jobs` under the command's program
    /// name; the slot announcement is written to `out`. When the job table is
    /// full the command still runs, but untracked, and a warning is printed.
    pub fn run(
        &self,
        argv: &[String],
        background: bool,
        jobs: &mut JobRegistry,
        out: &mut dyn Write,
    ) -> Result<Launch, ExecError> {
        let Some(name) = argv.first() else {
            return Err(ExecError::EmptyCommand);
        };
        let cargv = to_cstrings(argv)?;

        match unsafe { fork() } {
            Err(errno) => Err(ExecError::Launch(errno)),
            Ok(ForkResult::Child) => supervise(&cargv),
            Ok(ForkResult::Parent { child }) => {
                if background {
                    if !jobs.add(child, name, out)? {
                        eprintln!(
                            "Background task table is full ({} slots), dropping \"{name}\"",
                            jobs.capacity()
                        );
                    }
                    Ok(Launch::Background(child))
                } else {
                    let status = wait_uninterrupted(child).map_err(ExecError::Wait)?;
                    Ok(Launch::Foreground(exit_code(status)))
                }
            }
        }
    }
}

/// Body of the intermediate supervisor process. Never returns.
fn supervise(argv: &[CString]) -> ! {
    let outcome = ExecutionOutcome::begin();
    match unsafe { fork() } {
        Err(errno) => {
            eprintln!("{}", ExecError::Spawn(errno));
            process::exit(1);
        }
        Ok(ForkResult::Child) => {
            let errno = match execvp(&argv[0], argv) {
                Ok(never) => match never {},
                Err(errno) => errno,
            };
            eprintln!("{}", ExecError::Exec(errno as i32));
            process::exit(errno as i32);
        }
        Ok(ForkResult::Parent { child }) => {
            if let Err(errno) = wait_uninterrupted(child) {
                eprintln!("{}", ExecError::Wait(errno));
            }
            let outcome = outcome.finish();
            match Statistics::collect(&outcome) {
                Ok(stats) => {
                    if let Err(err) = stats.render(&mut std::io::stdout()) {
                        eprintln!("failed to print statistics: {err}");
                    }
                }
                Err(errno) => eprintln!("failed to read resource usage: {errno}"),
            }
            process::exit(0);
        }
    }
}

/// Wait for `child` to terminate, retrying when interrupted by a signal.
fn wait_uninterrupted(child: Pid) -> nix::Result<WaitStatus> {
    loop {
        match waitpid(child, None) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

fn exit_code(status: WaitStatus) -> ExitCode {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => -1,
    }
}

fn to_cstrings(argv: &[String]) -> Result<Vec<CString>, ExecError> {
    argv.iter()
        .map(|arg| CString::new(arg.as_str()).map_err(|_| ExecError::InvalidArgument(arg.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_foreground_run_waits_for_completion() {
        let executor = CommandExecutor;
        let mut jobs = JobRegistry::new();
        let mut out = Vec::new();

        let launch = executor
            .run(&args(&["true"]), false, &mut jobs, &mut out)
            .unwrap();
        // The supervisor exits 0 once the command has finished.
        assert_eq!(launch, Launch::Foreground(0));
        assert!(jobs.list().is_empty());
    }

    #[test]
    fn test_exec_failure_does_not_fail_the_shell() {
        let executor = CommandExecutor;
        let mut jobs = JobRegistry::new();
        let mut out = Vec::new();

        // The grandchild exits with the exec errno; the supervisor still
        // finishes normally, so the shell just moves on.
        let launch = executor.run(
            &args(&["definitely-not-an-existing-command"]),
            false,
            &mut jobs,
            &mut out,
        );
        assert!(matches!(launch, Ok(Launch::Foreground(_))));
    }

    #[test]
    fn test_background_run_registers_a_job() {
        let executor = CommandExecutor;
        let mut jobs = JobRegistry::new();
        let mut out = Vec::new();

        let launch = executor
            .run(&args(&["sleep", "1"]), true, &mut jobs, &mut out)
            .unwrap();
        let Launch::Background(pid) = launch else {
            panic!("expected a background launch");
        };

        let listed = jobs.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].1, pid);
        assert_eq!(listed[0].2, "sleep");
        assert!(String::from_utf8(out).unwrap().contains(&pid.to_string()));

        // Once the sleep finishes the supervisor exits and the job reaps.
        let mut reaped = false;
        for _ in 0..500 {
            if jobs.reap_all() == 0 {
                reaped = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(reaped, "background job was never reaped");
    }

    #[test]
    fn test_full_table_still_launches_but_untracked() {
        let executor = CommandExecutor;
        let mut jobs = JobRegistry::with_capacity(0);
        let mut out = Vec::new();

        let launch = executor
            .run(&args(&["sleep", "1"]), true, &mut jobs, &mut out)
            .unwrap();
        assert!(matches!(launch, Launch::Background(_)));
        assert!(jobs.list().is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_wait_uninterrupted_returns_child_status() {
        let child = std::process::Command::new("true").spawn().expect("spawn");
        let status = wait_uninterrupted(Pid::from_raw(child.id() as i32)).unwrap();
        assert!(matches!(status, WaitStatus::Exited(_, 0)));
    }

    #[test]
    fn test_empty_argv_is_rejected() {
        let executor = CommandExecutor;
        let mut jobs = JobRegistry::new();
        let mut out = Vec::new();

        let err = executor.run(&[], false, &mut jobs, &mut out).unwrap_err();
        assert!(matches!(err, ExecError::EmptyCommand));
    }

    #[test]
    fn test_interior_nul_is_rejected_before_forking() {
        let executor = CommandExecutor;
        let mut jobs = JobRegistry::new();
        let mut out = Vec::new();

        let err = executor
            .run(&args(&["echo", "bad\0arg"]), false, &mut jobs, &mut out)
            .unwrap_err();
        assert!(matches!(err, ExecError::InvalidArgument(_)));
    }
}
