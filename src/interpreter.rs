use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::executor::{CommandExecutor, Launch};
use crate::jobs::JobRegistry;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::time::Duration;

/// The prompt shown before each line is read.
const PROMPT: &str = "$>";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the built-in commands defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// An interactive command interpreter with background-task tracking.
///
/// Each line read from the user is tokenized on whitespace and dispatched:
/// built-in commands (`cd`, `exit`, `btasks`) run in-process through a list of
/// [`CommandFactory`] objects, everything else is handed to the
/// [`CommandExecutor`]. A trailing `&` token detaches the command as a
/// background job, tracked in the [`JobRegistry`] until a later reap pass
/// observes that it has finished.
pub struct Interpreter {
    env: Environment,
    jobs: JobRegistry,
    executor: CommandExecutor,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            jobs: JobRegistry::new(),
            executor: CommandExecutor,
            commands,
        }
    }

    /// Route one tokenized command line to a built-in or the executor.
    ///
    /// Returns the command's exit code. Launch failures are reported to
    /// stderr and mapped to exit code 1; they never tear down the shell.
    pub fn dispatch(&mut self, tokens: &[String], out: &mut dyn Write) -> anyhow::Result<ExitCode> {
        let (argv, background) = split_background(tokens);
        let Some(name) = argv.first() else {
            return Ok(0);
        };

        let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(name, &args) {
                return cmd.execute(out, &mut self.env, &mut self.jobs);
            }
        }

        match self.executor.run(argv, background, &mut self.jobs, out) {
            Ok(Launch::Foreground(code)) => Ok(code),
            Ok(Launch::Background(_)) => Ok(0),
            Err(err) => {
                eprintln!("{err}");
                Ok(1)
            }
        }
    }

    /// The Read-Eval-Print Loop.
    ///
    /// Runs until the `exit` built-in confirms there are no live background
    /// jobs left. End-of-input (Ctrl-D) takes the same guarded exit path.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let tokens = tokenize(&line);
                    if tokens.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    if let Err(err) = self.dispatch(&tokens, &mut std::io::stdout()) {
                        eprintln!("{err:#}");
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    let exit = vec!["exit".to_string()];
                    if let Err(err) = self.dispatch(&exit, &mut std::io::stdout()) {
                        eprintln!("{err:#}");
                    }
                    if !self.env.should_exit {
                        // Input is gone for good; re-prompting would only
                        // repeat the refusal. Wait the remaining jobs out.
                        self.drain_jobs();
                    }
                }
                Err(err) => return Err(err.into()),
            }

            if self.env.should_exit {
                break;
            }
        }

        Ok(())
    }

    /// Block until every background job has been reaped, then allow exit.
    ///
    /// Used when input has reached end-of-file while jobs are still live:
    /// there is no user left to re-prompt, so the shell waits for the jobs
    /// instead of spinning on the refusal message.
    fn drain_jobs(&mut self) {
        while self.jobs.reap_all() != 0 {
            std::thread::sleep(Duration::from_millis(200));
        }
        self.env.should_exit = true;
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of built-ins:
    /// `cd`, `pwd`, `exit` and `btasks` (alias `ap`).
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Btasks>::default()),
        ])
    }
}

/// Split a raw input line into argument tokens.
fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

/// Strip a trailing `&` marker, reporting whether one was present.
fn split_background(tokens: &[String]) -> (&[String], bool) {
    match tokens.split_last() {
        Some((last, rest)) if last == "&" => (rest, true),
        _ => (tokens, false),
    }
}
