//! The seam between code that needs commands run and the thing that runs them.

use crate::command::Command;
use crate::env::EnvScope;
use crate::error;
use crate::processes::ProcessExecutor;
use crate::results::CommandResult;

/// Runs commands to completion.
///
/// Production code runs real processes through [`ProcessExecutor`]; tests
/// substitute a double that hands back canned results.
pub trait Executor: Send + Sync {
    /// Runs a command with the given environment changes and returns its result.
    fn execute_in(&self, command: &Command, env: &EnvScope) -> Result<CommandResult, error::Error>;

    /// Runs a command in the inherited environment.
    fn execute(&self, command: &Command) -> Result<CommandResult, error::Error> {
        self.execute_in(command, &EnvScope::inherit())
    }

    /// Runs a command and reports whether it exited with 0. Errors running the
    /// command at all still propagate.
    fn succeeds(&self, command: &Command) -> Result<bool, error::Error> {
        Ok(self.execute(command)?.succeeded())
    }
}

impl Executor for ProcessExecutor {
    fn execute_in(&self, command: &Command, env: &EnvScope) -> Result<CommandResult, error::Error> {
        self.run(command, env)
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute_in(&self, command: &Command, env: &EnvScope) -> Result<CommandResult, error::Error> {
        (**self).execute_in(command, env)
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn execute_in(&self, command: &Command, env: &EnvScope) -> Result<CommandResult, error::Error> {
        (**self).execute_in(command, env)
    }
}
