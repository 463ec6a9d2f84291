//! Quoting a whole command so it can be passed as one argument to another
//! command, e.g. as the remote command of an `ssh` invocation.

use indexmap::IndexMap;

use crate::command::Command;

/// How embedded single quotes are handled when quoting a command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscapeMode {
    /// Precede each embedded `'` with a backslash. This is the established
    /// behavior, but a backslash does not escape anything inside single
    /// quotes, so commands containing `'` do not survive the round trip.
    #[default]
    Backslash,
    /// Close the quote, emit an escaped quote, and reopen (`'\''`), which a
    /// POSIX shell reads back as a literal `'`.
    Posix,
}

/// Wraps `s` in single quotes according to `mode`.
pub fn single_quote(s: &str, mode: EscapeMode) -> String {
    let escaped = match mode {
        EscapeMode::Backslash => s.replace('\'', r"\'"),
        EscapeMode::Posix => s.replace('\'', r"'\''"),
    };
    format!("'{escaped}'")
}

/// A command rendered as a single quoted token. Its environment is baked into
/// the quoted text rather than applied to the outer process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellEscaped {
    inner: Box<Command>,
    mode: EscapeMode,
    display_name: Option<String>,
}

impl ShellEscaped {
    /// Wraps a command using the default [`EscapeMode`].
    pub fn new(inner: impl Into<Command>) -> Self {
        Self::with_mode(inner, EscapeMode::default())
    }

    /// Wraps a command using the given escape mode.
    pub fn with_mode(inner: impl Into<Command>, mode: EscapeMode) -> Self {
        Self {
            inner: Box::new(inner.into()),
            mode,
            display_name: None,
        }
    }

    /// Returns the wrapped command.
    pub fn inner(&self) -> &Command {
        &self.inner
    }

    /// Returns the escape mode in use.
    pub const fn mode(&self) -> EscapeMode {
        self.mode
    }

    /// Overrides the name used in diagnostics.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Returns the name used in diagnostics: the override, or the wrapped command's.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.inner.name())
    }

    /// Returns the wrapped command's full `string_format()`, single-quoted.
    pub fn command(&self) -> String {
        single_quote(&self.inner.string_format(), self.mode)
    }

    /// Always empty.
    pub fn environment(&self) -> IndexMap<String, String> {
        IndexMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::CommandSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn quotes_whole_command_with_environment() {
        let inner = CommandSpec::with_args("ls", ["-l", "/srv"]).env("LANG", "C");
        let escaped = ShellEscaped::new(inner);

        assert_eq!(escaped.command(), "'LANG=C ls -l /srv'");
        assert!(escaped.environment().is_empty());
        assert_eq!(escaped.name(), "ls");
    }

    #[test]
    fn no_unescaped_quotes_without_embedded_quotes() {
        let escaped = ShellEscaped::new(CommandSpec::with_args("echo", ["a", "b", "c"]));
        let rendered = escaped.command();
        let body = rendered
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''));
        assert_eq!(body, Some("echo a b c"));
    }

    #[test]
    fn backslash_mode_keeps_fragile_behavior() {
        assert_eq!(
            single_quote("echo 'hi'", EscapeMode::Backslash),
            r"'echo \'hi\''"
        );
    }

    #[test]
    fn posix_mode_closes_and_reopens() {
        assert_eq!(
            single_quote("echo 'hi'", EscapeMode::Posix),
            r"'echo '\''hi'\'''"
        );
    }
}
