//! A small interactive command interpreter with background-task tracking.
//!
//! The shell launches external programs through a two-level spawn protocol
//! (see [`executor`]): an intermediate supervisor process forks the command
//! itself, waits for it, and reports wall-clock and resource-usage statistics
//! scoped to exactly that one run. Commands ending in `&` are detached and
//! tracked in a fixed-capacity [`jobs::JobRegistry`] until a later
//! non-blocking reap pass observes that they have finished.
//!
//! The main entry point is [`Interpreter`], which owns the registry, the
//! executor and the built-in commands (`cd`, `pwd`, `exit`, `btasks`) and
//! drives the interactive read loop.

mod builtin;
pub mod command;
pub mod env;
pub mod executor;
mod interpreter;
pub mod jobs;
pub mod stats;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
