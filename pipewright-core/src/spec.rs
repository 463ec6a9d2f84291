//! Description of a single external program invocation.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::results::{STDERR, STDIN, STDOUT, StreamId};

/// Direction of a redirection directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Direction {
    /// Send the stream's output to a file (`N>path`).
    #[strum(serialize = ">")]
    To,
    /// Feed the stream's input from a file (`N<path`).
    #[strum(serialize = "<")]
    From,
    /// Duplicate the stream onto another stream (`A>&B`).
    #[strum(serialize = ">&")]
    Dup,
}

/// Target of a redirection directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedirectTarget {
    /// A filesystem path.
    Path(String),
    /// Another stream, by number.
    Stream(StreamId),
}

impl std::fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Stream(stream) => write!(f, "{stream}"),
        }
    }
}

/// A single redirection directive, rendered as raw shell syntax.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirection {
    /// The stream being redirected.
    pub stream: StreamId,
    /// Which way the redirection goes.
    pub direction: Direction,
    /// Where the stream is redirected.
    pub target: RedirectTarget,
}

impl std::fmt::Display for Redirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.stream, self.direction, self.target)
    }
}

/// Describes an executable, its arguments, environment overrides, and I/O
/// redirections. A spec is never run itself; running one produces a separate
/// [`crate::CommandResult`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program name or path.
    pub executable: String,
    /// Arguments, in order.
    pub arguments: Vec<String>,
    /// Environment overrides merged over the parent's environment at spawn time.
    pub environment: IndexMap<String, String>,
    /// Redirection directives, in order of appearance.
    pub redirections: Vec<Redirection>,
    /// Name used in diagnostics; defaults to the executable.
    pub display_name: Option<String>,
}

impl CommandSpec {
    /// Creates a spec for the given executable with no arguments.
    ///
    /// # Arguments
    ///
    /// * `executable` - The program name or path.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    /// Creates a spec for the given executable and arguments.
    pub fn with_args<I, S>(executable: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            executable: executable.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Sets an environment override.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Overrides the name used in diagnostics.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Returns the name used in diagnostics.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.executable)
    }

    /// Returns `[executable] + arguments + redirection tokens`.
    pub fn render_argv(&self) -> Vec<String> {
        std::iter::once(self.executable.clone())
            .chain(self.arguments.iter().cloned())
            .chain(self.redirections.iter().map(ToString::to_string))
            .collect()
    }

    /// Renders the spec as a single shell-ready string.
    pub fn command(&self) -> String {
        self.render_argv().join(" ")
    }

    /// Renders the command prefixed with its `KEY=VALUE` environment pairs.
    pub fn string_format(&self) -> String {
        format_with_env(&self.environment, &self.command())
    }

    /// Returns whether the spec can be exec'd without a shell.
    pub fn is_simple(&self) -> bool {
        self.redirections.is_empty()
    }

    /// Appends a `stream>path` redirection.
    pub fn redirect_to(&mut self, stream: StreamId, path: impl Into<String>) -> &mut Self {
        self.push_redirection(stream, Direction::To, RedirectTarget::Path(path.into()))
    }

    /// Appends a `stream<path` redirection.
    pub fn redirect_from(&mut self, path: impl Into<String>, stream: StreamId) -> &mut Self {
        self.push_redirection(stream, Direction::From, RedirectTarget::Path(path.into()))
    }

    /// Appends a `from>&to` stream duplication.
    pub fn copy_stream_to(&mut self, from: StreamId, to: StreamId) -> &mut Self {
        self.push_redirection(from, Direction::Dup, RedirectTarget::Stream(to))
    }

    /// Redirects standard output to the given path.
    pub fn redirect_stdout(&mut self, path: impl Into<String>) -> &mut Self {
        self.redirect_to(STDOUT, path)
    }

    /// Redirects standard error to the given path.
    pub fn redirect_stderr(&mut self, path: impl Into<String>) -> &mut Self {
        self.redirect_to(STDERR, path)
    }

    /// Feeds standard input from the given path.
    pub fn redirect_stdin(&mut self, path: impl Into<String>) -> &mut Self {
        self.redirect_from(path, STDIN)
    }

    fn push_redirection(
        &mut self,
        stream: StreamId,
        direction: Direction,
        target: RedirectTarget,
    ) -> &mut Self {
        // No conflict detection; the shell applies them in textual order.
        self.redirections.push(Redirection {
            stream,
            direction,
            target,
        });
        self
    }
}

/// Coerces a word list into a spec: the first word is the executable and the
/// rest are arguments. An empty list yields a spec with an empty executable.
impl<S: Into<String>> FromIterator<S> for CommandSpec {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut words = iter.into_iter().map(Into::into);
        let executable = words.next().unwrap_or_default();
        Self {
            executable,
            arguments: words.collect(),
            ..Self::default()
        }
    }
}

impl From<&str> for CommandSpec {
    fn from(executable: &str) -> Self {
        Self::new(executable)
    }
}

impl From<String> for CommandSpec {
    fn from(executable: String) -> Self {
        Self::new(executable)
    }
}

impl<S: Into<String>> From<Vec<S>> for CommandSpec {
    fn from(words: Vec<S>) -> Self {
        words.into_iter().collect()
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for CommandSpec {
    fn from(words: [S; N]) -> Self {
        words.into_iter().collect()
    }
}

/// Characters that make a rendered command line shell syntax.
const SHELL_METACHARACTERS: &[char] = &[
    '*', '?', '{', '}', '[', ']', '<', '>', '(', ')', '~', '&', '|', '\\', '$', ';', '\'', '`',
    '"', '\n', '#',
];

/// Words that only mean something to a shell when they start a command line.
const SHELL_ONLY_WORDS: &[&str] = &[
    "!", ".", ":", "break", "case", "continue", "do", "done", "elif", "else", "esac", "eval",
    "exec", "exit", "export", "fi", "for", "if", "in", "readonly", "return", "set", "shift",
    "then", "times", "trap", "until", "unset", "while",
];

/// Returns whether a rendered command line needs a shell to mean what it
/// says: it contains metacharacters, starts with a reserved word or special
/// builtin, or starts with a variable assignment.
pub(crate) fn needs_shell(command_line: &str) -> bool {
    if command_line.contains(SHELL_METACHARACTERS) {
        return true;
    }

    command_line
        .split_whitespace()
        .next()
        .is_none_or(|first| SHELL_ONLY_WORDS.contains(&first) || first.contains('='))
}

pub(crate) fn format_with_env(environment: &IndexMap<String, String>, command: &str) -> String {
    environment
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .chain(std::iter::once(command.to_owned()))
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_executable_and_arguments() {
        let spec = CommandSpec::with_args("echo", ["-n", "Some text"]);
        assert_eq!(spec.command(), "echo -n Some text");
        assert_eq!(spec.name(), "echo");
    }

    #[test]
    fn rendering_starts_with_executable() {
        for spec in [
            CommandSpec::new("true"),
            CommandSpec::with_args("ls", ["-l", "/tmp"]),
            CommandSpec::new("cat").env("A", "b"),
        ] {
            assert!(spec.command().starts_with(&spec.executable));
        }
    }

    #[test]
    fn redirections_follow_arguments() {
        let mut spec = CommandSpec::with_args("grep", ["*.rb"]);
        spec.redirect_stderr("/dev/null")
            .redirect_stdout("/tmp/rubyfiles.txt")
            .redirect_stdin("in.txt")
            .copy_stream_to(2, 1);

        assert_eq!(
            spec.command(),
            "grep *.rb 2>/dev/null 1>/tmp/rubyfiles.txt 0<in.txt 2>&1"
        );
        assert!(!spec.is_simple());
    }

    #[test]
    fn string_format_prefixes_environment() {
        let spec = CommandSpec::new("env")
            .env("TEST_ENV", "indubitably")
            .env("OTHER", "1");
        assert_eq!(spec.string_format(), "TEST_ENV=indubitably OTHER=1 env");
        assert_eq!(CommandSpec::new("env").string_format(), "env");
    }

    #[test]
    fn display_name_is_independent() {
        let spec = CommandSpec::new("/usr/bin/make").named("build");
        assert_eq!(spec.name(), "build");
        assert_eq!(spec.command(), "/usr/bin/make");
    }

    #[test]
    fn plain_words_do_not_need_a_shell() {
        assert!(!needs_shell("ls -l /tmp"));
        assert!(!needs_shell("make install DESTDIR=/srv"));
        assert!(!needs_shell("definitely-not-a-program-xyz"));
    }

    #[test]
    fn shell_syntax_needs_a_shell() {
        assert!(needs_shell("echo a | wc -l"));
        assert!(needs_shell("grep *.rb"));
        assert!(needs_shell("sh -c 'exit 3'"));
        assert!(needs_shell("echo $HOME"));
        assert!(needs_shell("exit 3"));
        assert!(needs_shell("A=1 env"));
        assert!(needs_shell(""));
    }

    #[test]
    fn coerces_word_lists() {
        let spec = CommandSpec::from(["gem", "install", "bundler"]);
        assert_eq!(spec.executable, "gem");
        assert_eq!(spec.arguments, vec!["install", "bundler"]);

        let empty: CommandSpec = Vec::<String>::new().into();
        assert!(empty.executable.is_empty());
    }
}
