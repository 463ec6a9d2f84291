//! Composable command lines, subprocess spawning, and deadlock-free collection
//! of their output.
//!
//! Commands are described with [`CommandSpec`], composed into [`Chain`]s with
//! the `&`, `|`, and `-` operators, and run through an [`Executor`]. The
//! production executor, [`ProcessExecutor`], spawns one OS process per command
//! and drains its stdout and stderr concurrently into a [`CommandResult`].

mod chain;
mod collector;
mod command;
mod console;
mod env;
mod error;
mod escape;
mod executor;
mod options;
mod processes;
mod results;
mod spec;
mod sys;

pub mod trace_categories;

pub use chain::{Chain, ChainKind};
pub use collector::CollectorState;
pub use command::Command;
pub use console::{CapturedOutput, Console};
pub use env::EnvScope;
pub use error::Error;
pub use escape::{EscapeMode, ShellEscaped, single_quote};
pub use executor::Executor;
pub use options::{CollectorOptions, ExecutorOptions, SpawnMode};
pub use processes::{
    DetachedProcess, ProcessExecutor, RunningCommand, is_registered_for_exit_interrupt,
};
pub use results::{CommandResult, STDERR, STDIN, STDOUT, StreamId};
pub use spec::{CommandSpec, Direction, RedirectTarget, Redirection};
