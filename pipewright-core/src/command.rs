//! The command model and its composition operators.
//!
//! Commands compose with three binary operators, each of which extends the
//! left operand in place when it is already a chain of the same kind:
//!
//! * `a & b` (or [`Command::and`]) runs `b` only if `a` succeeds (`a && b`).
//! * `a | b` (or [`Command::pipe`]) pipes `a`'s stdout into `b` (`a | b`).
//! * `a - b` (or [`Command::wrap`]) appends `b` after a separator (`a -- b`).
//!
//! Any right-hand operand convertible into a [`Command`] is accepted; word
//! lists are coerced into a [`CommandSpec`] whose first word is the executable.

use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Sub, SubAssign};

use indexmap::IndexMap;

use crate::chain::{Chain, ChainKind};
use crate::escape::ShellEscaped;
use crate::spec::{self, CommandSpec};

/// Anything that can be rendered and run: a single spec, a chain, or a
/// shell-escaped command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// A single program invocation.
    Spec(CommandSpec),
    /// A composition of commands.
    Chain(Chain),
    /// A command quoted into a single token.
    Escaped(ShellEscaped),
}

impl Default for Command {
    fn default() -> Self {
        Self::Spec(CommandSpec::default())
    }
}

impl Command {
    /// Returns the name used in diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Self::Spec(spec) => spec.name(),
            Self::Chain(chain) => chain.name(),
            Self::Escaped(escaped) => escaped.name(),
        }
    }

    /// Renders the command as a single shell-ready string.
    pub fn command(&self) -> String {
        match self {
            Self::Spec(spec) => spec.command(),
            Self::Chain(chain) => chain.command(),
            Self::Escaped(escaped) => escaped.command(),
        }
    }

    /// Returns the environment overrides to apply when spawning.
    pub fn environment(&self) -> IndexMap<String, String> {
        match self {
            Self::Spec(spec) => spec.environment.clone(),
            Self::Chain(chain) => chain.environment(),
            Self::Escaped(escaped) => escaped.environment(),
        }
    }

    /// Renders the command prefixed with its `KEY=VALUE` environment pairs.
    pub fn string_format(&self) -> String {
        spec::format_with_env(&self.environment(), &self.command())
    }

    /// Returns the underlying spec when this is a bare spec with no
    /// redirections, i.e. one that can be exec'd without a shell.
    pub fn as_simple_spec(&self) -> Option<&CommandSpec> {
        match self {
            Self::Spec(spec) if spec.is_simple() => Some(spec),
            _ => None,
        }
    }

    /// Returns whether there is nothing to run.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Spec(spec) => spec.executable.is_empty(),
            Self::Chain(chain) => chain.members().iter().all(Self::is_empty),
            Self::Escaped(escaped) => escaped.inner().is_empty(),
        }
    }

    /// Quotes this command into a single token.
    #[must_use]
    pub fn escaped(self) -> Self {
        Self::Escaped(ShellEscaped::new(self))
    }

    /// Sequences `next` after this command, aborting on failure.
    #[must_use]
    pub fn and(self, next: impl Into<Self>) -> Self {
        self.compose(ChainKind::And, next.into())
    }

    /// Pipes this command's stdout into `next`.
    #[must_use]
    pub fn pipe(self, next: impl Into<Self>) -> Self {
        self.compose(ChainKind::Pipe, next.into())
    }

    /// Appends `next` after a `--` separator.
    #[must_use]
    pub fn wrap(self, next: impl Into<Self>) -> Self {
        self.compose(ChainKind::Wrap, next.into())
    }

    fn compose(self, kind: ChainKind, next: Self) -> Self {
        match self {
            Self::Chain(mut chain) if chain.kind() == kind => {
                chain.add(next);
                Self::Chain(chain)
            }
            other => Self::Chain(Chain::new(kind, [other, next])),
        }
    }
}

impl From<CommandSpec> for Command {
    fn from(spec: CommandSpec) -> Self {
        Self::Spec(spec)
    }
}

impl From<Chain> for Command {
    fn from(chain: Chain) -> Self {
        Self::Chain(chain)
    }
}

impl From<ShellEscaped> for Command {
    fn from(escaped: ShellEscaped) -> Self {
        Self::Escaped(escaped)
    }
}

impl From<&str> for Command {
    fn from(executable: &str) -> Self {
        Self::Spec(executable.into())
    }
}

impl From<String> for Command {
    fn from(executable: String) -> Self {
        Self::Spec(executable.into())
    }
}

impl<S: Into<String>> From<Vec<S>> for Command {
    fn from(words: Vec<S>) -> Self {
        Self::Spec(words.into())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Command {
    fn from(words: [S; N]) -> Self {
        Self::Spec(words.into())
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.string_format())
    }
}

macro_rules! composition_operator {
    ($op:ident, $method:ident, $assign_op:ident, $assign_method:ident, $compose:ident) => {
        impl<T: Into<Command>> $op<T> for Command {
            type Output = Command;

            fn $method(self, rhs: T) -> Command {
                self.$compose(rhs)
            }
        }

        impl<T: Into<Command>> $op<T> for CommandSpec {
            type Output = Command;

            fn $method(self, rhs: T) -> Command {
                Command::from(self).$compose(rhs)
            }
        }

        impl<T: Into<Command>> $assign_op<T> for Command {
            fn $assign_method(&mut self, rhs: T) {
                *self = std::mem::take(self).$compose(rhs);
            }
        }
    };
}

composition_operator!(BitAnd, bitand, BitAndAssign, bitand_assign, and);
composition_operator!(BitOr, bitor, BitOrAssign, bitor_assign, pipe);
composition_operator!(Sub, sub, SubAssign, sub_assign, wrap);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cmd<const N: usize>(words: [&str; N]) -> Command {
        Command::from(words)
    }

    #[test]
    fn wrap_operator_builds_wrapping_chain() {
        let command = CommandSpec::new("sudo") - ["gem", "install", "bundler"];
        let Command::Chain(chain) = &command else {
            panic!("expected a chain, got {command:?}");
        };
        assert_eq!(chain.kind(), ChainKind::Wrap);
        assert_eq!(chain.members().len(), 2);
        assert!(chain.members().iter().all(|m| matches!(m, Command::Spec(_))));
        assert_eq!(command.command(), "sudo -- gem install bundler");
    }

    #[test]
    fn pipe_operator_builds_pipeline() {
        let command = CommandSpec::with_args("cat", ["/etc/passwd"]) | ["grep", "root"];
        assert_eq!(command.command(), "cat /etc/passwd | grep root");
    }

    #[test]
    fn and_operator_builds_prerequisite_chain() {
        let command = cmd(["cd", "/tmp/trash"]) & ["rm", "-rf", "*"];
        assert_eq!(command.command(), "cd /tmp/trash && rm -rf *");
    }

    #[test]
    fn composition_flattens_into_existing_chain() {
        let command = cmd(["a"]).and("b").and("c");
        let Command::Chain(chain) = &command else {
            panic!("expected a chain, got {command:?}");
        };
        assert_eq!(chain.members().len(), 3);
    }

    #[test]
    fn and_composition_is_associative_in_rendering() {
        let left = (cmd(["a", "1"]) & cmd(["b", "2"])) & cmd(["c", "3"]);
        let right = cmd(["a", "1"]) & (cmd(["b", "2"]) & cmd(["c", "3"]));
        assert_eq!(left.command(), right.command());
        assert_eq!(left.command(), "a 1 && b 2 && c 3");
    }

    #[test]
    fn mixed_kinds_nest() {
        let mut command = cmd(["cd", "a_dir"]);
        command &= "ls";
        command |= "grep";
        assert_eq!(command.command(), "cd a_dir && ls | grep");
    }

    #[test]
    fn pipeline_string_format_carries_environment() {
        let command = Command::from("env") | CommandSpec::new("cat").env("TEST_ENV", "indubitably");
        assert_eq!(command.command(), "env | cat");
        assert_eq!(command.string_format(), "TEST_ENV=indubitably env | cat");
        assert_eq!(command.name(), "cat");
    }

    #[test]
    fn escaped_command_has_no_outer_environment() {
        let command = CommandSpec::new("ssh").arg("host")
            - Command::from(CommandSpec::new("make").env("JOBS", "4")).escaped();
        assert_eq!(command.command(), "ssh host -- 'JOBS=4 make'");
        assert_eq!(command.string_format(), "ssh host -- 'JOBS=4 make'");
    }

    #[test]
    fn simple_spec_detection() {
        assert!(cmd(["ls"]).as_simple_spec().is_some());
        assert!((cmd(["ls"]) | "wc").as_simple_spec().is_none());
        assert!(Command::default().is_empty());
    }
}
