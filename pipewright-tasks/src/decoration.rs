//! How a task transforms its commands before running them.

use pipewright_core::{Command, CommandSpec, EnvScope, EscapeMode, ShellEscaped};

use crate::error::TaskError;

/// Environment variables through which Bundler and RubyGems make a child
/// process load the parent's bundle.
pub const BUNDLER_ENV_VARS: &[&str] = &[
    "BUNDLE_GEMFILE",
    "BUNDLE_BIN_PATH",
    "BUNDLER_VERSION",
    "BUNDLER_SETUP",
    "RUBYOPT",
    "RUBYLIB",
    "GEM_HOME",
    "GEM_PATH",
];

/// A command ready to hand to an executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// The command to run.
    pub command: Command,
    /// Environment changes for this run.
    pub env: EnvScope,
}

/// Transforms a task's command (and verification command) before it runs.
pub trait Decorate {
    /// Whether this decoration already isolates commands from the parent's
    /// Bundler environment.
    const CLEANS_BUNDLER_ENV: bool = false;

    /// Produces the invocation that actually runs `command`.
    ///
    /// # Arguments
    ///
    /// * `task` - Name of the task, for diagnostics.
    /// * `command` - The undecorated command.
    fn decorate(&self, task: &str, command: &Command) -> Result<Invocation, TaskError>;
}

/// Runs commands as given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Plain;

impl Decorate for Plain {
    fn decorate(&self, _task: &str, command: &Command) -> Result<Invocation, TaskError> {
        Ok(Invocation {
            command: command.clone(),
            env: EnvScope::inherit(),
        })
    }
}

/// Runs commands with the Bundler/RubyGems loader variables removed from the
/// child's environment. The parent's environment is left alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bundle;

impl Decorate for Bundle {
    const CLEANS_BUNDLER_ENV: bool = true;

    fn decorate(&self, _task: &str, command: &Command) -> Result<Invocation, TaskError> {
        Ok(Invocation {
            command: command.clone(),
            env: EnvScope::inherit().remove_all(BUNDLER_ENV_VARS.iter().copied()),
        })
    }
}

/// The host a remote task connects to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteServer {
    /// Host name or address.
    pub address: Option<String>,
    /// Login user.
    pub user: Option<String>,
}

/// Runs commands on a remote host over `ssh`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Remote {
    server: RemoteServer,
    ssh_options: Vec<String>,
    id_file: Option<String>,
    remote_target: Option<String>,
    escape_mode: EscapeMode,
}

impl Remote {
    /// Targets the given host.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            server: RemoteServer {
                address: Some(address.into()),
                user: None,
            },
            ..Self::default()
        }
    }

    /// Targets the given server description, which may lack an address.
    pub fn for_server(server: RemoteServer) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }

    /// Sets the login user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.server.user = Some(user.into());
        self
    }

    /// Adds an `-o "name=value"` option.
    #[must_use]
    pub fn ssh_option(mut self, name: &str, value: &str) -> Self {
        self.ssh_options.push(format!("\"{name}={value}\""));
        self
    }

    /// Sets the identity file passed with `-i`.
    #[must_use]
    pub fn id_file(mut self, path: impl Into<String>) -> Self {
        self.id_file = Some(path.into());
        self
    }

    /// Overrides the `[user@]host` argument.
    #[must_use]
    pub fn remote_target(mut self, target: impl Into<String>) -> Self {
        self.remote_target = Some(target.into());
        self
    }

    /// Sets how the remote command is quoted.
    #[must_use]
    pub const fn escape_mode(mut self, mode: EscapeMode) -> Self {
        self.escape_mode = mode;
        self
    }

    /// Returns the server description.
    pub const fn server(&self) -> &RemoteServer {
        &self.server
    }

    /// Returns the `[user@]host` argument: the override, or the user and
    /// address joined with `@`. `None` without an address.
    pub fn target(&self) -> Option<String> {
        if let Some(target) = &self.remote_target {
            return Some(target.clone());
        }

        let address = self.server.address.as_ref()?;
        Some(match &self.server.user {
            Some(user) => format!("{user}@{address}"),
            None => address.clone(),
        })
    }

    fn ssh(&self, target: String) -> CommandSpec {
        let mut ssh = CommandSpec::new("ssh");
        if let Some(id_file) = &self.id_file {
            ssh = ssh.arg("-i").arg(id_file.as_str());
        }
        for option in &self.ssh_options {
            ssh = ssh.arg("-o").arg(option.as_str());
        }
        ssh.arg(target)
    }
}

impl Decorate for Remote {
    fn decorate(&self, task: &str, command: &Command) -> Result<Invocation, TaskError> {
        let target = self
            .target()
            .filter(|_| self.server.address.is_some())
            .ok_or_else(|| TaskError::MissingRemoteServer(task.to_owned()))?;

        if command.is_empty() {
            return Err(TaskError::EmptyRemoteCommand(task.to_owned()));
        }

        let remote = ShellEscaped::with_mode(command.clone(), self.escape_mode);

        Ok(Invocation {
            command: self.ssh(target) - remote,
            env: EnvScope::inherit(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn remote_wraps_escaped_command() {
        let remote = Remote::new("build.example.com")
            .user("deploy")
            .id_file("/keys/deploy")
            .ssh_option("StrictHostKeyChecking", "no");
        let command = CommandSpec::with_args("make", ["install"]).env("JOBS", "4");

        let invocation = remote.decorate("deploy", &command.into()).unwrap();

        assert_eq!(
            invocation.command.string_format(),
            "ssh -i /keys/deploy -o \"StrictHostKeyChecking=no\" deploy@build.example.com -- 'JOBS=4 make install'"
        );
    }

    #[test]
    fn remote_target_defaults() {
        assert_eq!(Remote::new("host").target().as_deref(), Some("host"));
        assert_eq!(
            Remote::new("host").user("me").target().as_deref(),
            Some("me@host")
        );
        assert_eq!(
            Remote::new("host").remote_target("alias").target().as_deref(),
            Some("alias")
        );
        assert_eq!(Remote::default().target(), None);
    }

    #[test]
    fn remote_requires_address_and_command() {
        let err = Remote::for_server(RemoteServer::default())
            .remote_target("alias")
            .decorate("t", &Command::from("ls"))
            .unwrap_err();
        assert!(matches!(err, TaskError::MissingRemoteServer(_)));

        let err = Remote::new("host")
            .decorate("t", &Command::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::EmptyRemoteCommand(_)));
    }

    #[test]
    fn posix_escaping_is_available() {
        let remote = Remote::new("host").escape_mode(EscapeMode::Posix);
        let invocation = remote
            .decorate("t", &CommandSpec::with_args("echo", ["'hi'"]).into())
            .unwrap();
        assert_eq!(invocation.command.command(), r"ssh host -- 'echo '\''hi'\'''");
    }

    #[test]
    fn bundle_scrubs_loader_variables() {
        let invocation = Bundle.decorate("t", &Command::from("rake")).unwrap();
        assert_eq!(invocation.command, Command::from("rake"));
        assert_eq!(invocation.env.removals(), BUNDLER_ENV_VARS);
        assert!(invocation.env.overrides().is_empty());
    }
}
