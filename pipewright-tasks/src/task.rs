//! Tasks that run a command unless a verification command says there is
//! nothing to do.

use pipewright_core::{Command, CommandResult, Executor, trace_categories};

use crate::decoration::{Bundle, Decorate, Plain, Remote};
use crate::deferred::Deferred;
use crate::error::TaskError;

/// Executable whose commands inherit the caller's bundle unless scrubbed.
const BUNDLE_EXECUTABLE: &str = "bundle";

/// Runs a command, optionally guarded by a verification command.
///
/// The task is needed when it has no verification command, or when the
/// verification command fails. Both commands pass through the task's
/// decoration before they run.
#[derive(Debug)]
pub struct CommandTask<D = Plain> {
    name: String,
    command: Command,
    verify_command: Option<Deferred<Command>>,
    decoration: D,
    finalized: bool,
}

/// A command task that runs its commands on a remote host.
pub type RemoteCommandTask = CommandTask<Remote>;

/// A command task that runs its commands outside the caller's bundle.
pub type BundleCommandTask = CommandTask<Bundle>;

impl CommandTask<Plain> {
    /// Creates a task that runs `command` as given.
    pub fn new(name: impl Into<String>, command: impl Into<Command>) -> Self {
        Self::with_decoration(name, command, Plain)
    }
}

impl CommandTask<Remote> {
    /// Creates a task that runs `command` on the host `remote` describes.
    pub fn remote(name: impl Into<String>, command: impl Into<Command>, remote: Remote) -> Self {
        Self::with_decoration(name, command, remote)
    }
}

impl CommandTask<Bundle> {
    /// Creates a task that runs `command` without the caller's bundle.
    pub fn bundle(name: impl Into<String>, command: impl Into<Command>) -> Self {
        Self::with_decoration(name, command, Bundle)
    }
}

impl<D: Decorate> CommandTask<D> {
    /// Creates a task with an explicit decoration.
    pub fn with_decoration(
        name: impl Into<String>,
        command: impl Into<Command>,
        decoration: D,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            verify_command: None,
            decoration,
            finalized: false,
        }
    }

    /// Sets the verification command.
    #[must_use]
    pub fn verify_with(mut self, command: impl Into<Command>) -> Self {
        self.verify_command = Some(Deferred::Value(command.into()));
        self
    }

    /// Sets a function computing the verification command on first use.
    #[must_use]
    pub fn verify_with_supplier(
        mut self,
        supplier: impl FnMut() -> Command + Send + Sync + 'static,
    ) -> Self {
        self.verify_command = Some(Deferred::supplier(supplier));
        self
    }

    /// Returns the task's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the undecorated command.
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Returns the decoration.
    pub const fn decoration(&self) -> &D {
        &self.decoration
    }

    /// Returns the verification command, resolving it if it is deferred.
    pub fn verify_command(&mut self) -> Option<&Command> {
        self.verify_command.as_mut().map(Deferred::resolve)
    }

    /// Returns configuration warnings: commands that run `bundle` in a task
    /// that does not isolate them from the caller's bundle.
    pub fn warnings(&mut self) -> Vec<String> {
        if D::CLEANS_BUNDLER_ENV {
            return vec![];
        }

        let mut warnings = vec![];
        if self
            .verify_command()
            .is_some_and(|verify| verify.name() == BUNDLE_EXECUTABLE)
        {
            warnings.push(format!(
                "verify command is '{BUNDLE_EXECUTABLE}' - this sometimes has unexpected results; consider a bundle command task"
            ));
        }
        if self.command.name() == BUNDLE_EXECUTABLE {
            warnings.push(format!(
                "command is '{BUNDLE_EXECUTABLE}' - this sometimes has unexpected results; consider a bundle command task"
            ));
        }
        warnings
    }

    fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        for warning in self.warnings() {
            tracing::warn!(target: trace_categories::TASKS, "{}: {warning}", self.name);
        }
    }

    /// Returns whether the task's command needs to run.
    pub fn needed<E: Executor + ?Sized>(&mut self, executor: &E) -> Result<bool, TaskError> {
        self.finalize();

        let Some(verify) = self.verify_command.as_mut().map(Deferred::resolve) else {
            tracing::debug!(target: trace_categories::TASKS, "{}: no verify command; needed", self.name);
            return Ok(true);
        };

        let invocation = self.decoration.decorate(&self.name, verify)?;
        let verified = executor
            .execute_in(&invocation.command, &invocation.env)?
            .succeeded();

        tracing::debug!(target: trace_categories::TASKS, "{}: verify command {}", self.name, if verified { "succeeded; not needed" } else { "failed; needed" });

        Ok(!verified)
    }

    /// Runs the task's command and requires it to succeed.
    pub fn action<E: Executor + ?Sized>(
        &mut self,
        executor: &E,
    ) -> Result<CommandResult, TaskError> {
        self.finalize();

        let invocation = self.decoration.decorate(&self.name, &self.command)?;
        let result = executor.execute_in(&invocation.command, &invocation.env)?;
        result.must_succeed()?;

        Ok(result)
    }

    /// Runs the action if the task is needed. Returns the command's result,
    /// or `None` when verification showed there was nothing to do.
    pub fn invoke<E: Executor + ?Sized>(
        &mut self,
        executor: &E,
    ) -> Result<Option<CommandResult>, TaskError> {
        if self.needed(executor)? {
            self.action(executor).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::BUNDLER_ENV_VARS;
    use pipewright_core::CommandSpec;
    use pipewright_test_harness::{CommandPattern, MockExecutor};
    use pretty_assertions::assert_eq;

    #[test]
    fn runs_without_verification() -> anyhow::Result<()> {
        let mock = MockExecutor::new();
        mock.expect_command("make all", 0);

        let mut task = CommandTask::new("build", ["make", "all"]);
        assert!(task.invoke(&mock)?.is_some());

        mock.verify()
    }

    #[test]
    fn succeeding_verification_skips_action() -> anyhow::Result<()> {
        let mock = MockExecutor::new();
        mock.expect_command("test -f out.tar", 0);

        let mut task = CommandTask::new("pack", ["tar", "cf", "out.tar", "."])
            .verify_with(["test", "-f", "out.tar"]);
        assert!(task.invoke(&mock)?.is_none());

        mock.verify()
    }

    #[test]
    fn failing_verification_runs_action() -> anyhow::Result<()> {
        let mock = MockExecutor::new();
        mock.expect_command("test -f out.tar", 1)
            .expect_command("tar cf out.tar .", 0);

        let mut task = CommandTask::new("pack", ["tar", "cf", "out.tar", "."])
            .verify_with(["test", "-f", "out.tar"]);
        assert!(task.needed(&mock)?);
        task.action(&mock)?;

        mock.verify()
    }

    #[test]
    fn failing_action_reports_command_failure() {
        let mock = MockExecutor::new();
        mock.expect_command("false", (1, "why"));

        let mut task = CommandTask::new("fail", "false");
        let err = task.invoke(&mock).unwrap_err();

        let TaskError::Command(inner) = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(inner.is_command_failure());
        assert!(err.to_string().contains("why"));
    }

    #[test]
    fn deferred_verification_resolves_once() -> anyhow::Result<()> {
        let mock = MockExecutor::new();
        mock.expect_command("which rake", 0);

        let mut task = CommandTask::new("rake", "rake")
            .verify_with_supplier(|| Command::from(["which", "rake"]));
        assert!(!task.needed(&mock)?);
        assert_eq!(task.verify_command().map(Command::command).as_deref(), Some("which rake"));

        mock.verify()
    }

    #[test]
    fn bundle_commands_warn_outside_bundle_tasks() {
        let mut task =
            CommandTask::new("install", ["bundle", "install"]).verify_with(["bundle", "check"]);
        assert_eq!(task.warnings().len(), 2);

        let mut task =
            CommandTask::bundle("install", ["bundle", "install"]).verify_with(["bundle", "check"]);
        assert!(task.warnings().is_empty());

        let mut task = CommandTask::new("install", CommandSpec::new("bundle").named("deps"));
        assert!(task.warnings().is_empty());
    }

    #[test]
    fn bundle_task_scrubs_environment() -> anyhow::Result<()> {
        let mock = MockExecutor::new();
        mock.expect_command("bundle install", 0);

        CommandTask::bundle("install", ["bundle", "install"]).action(&mock)?;

        let executed = mock.executed();
        assert_eq!(executed[0].env.removals(), BUNDLER_ENV_VARS);
        mock.verify()
    }

    #[test]
    fn remote_task_decorates_both_commands() -> anyhow::Result<()> {
        let mock = MockExecutor::new();
        mock.expect_command(CommandPattern::regex(r"^ssh deploy@web -- 'test -d /srv/app'$")?, 1)
            .expect_command("ssh deploy@web -- 'mkdir /srv/app'", 0);

        let mut task = CommandTask::remote(
            "mkdir",
            ["mkdir", "/srv/app"],
            Remote::new("web").user("deploy"),
        )
        .verify_with(["test", "-d", "/srv/app"]);
        task.invoke(&mock)?;

        mock.verify()
    }

    #[test]
    fn remote_task_without_server_fails() {
        let mock = MockExecutor::new();
        let mut task = CommandTask::remote("ls", "ls", Remote::default());
        let err = task.action(&mock).unwrap_err();
        assert!(matches!(err, TaskError::MissingRemoteServer(name) if name == "ls"));
    }
}
