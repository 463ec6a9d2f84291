//! Ordered compositions of commands.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::command::Command;

/// How the members of a [`Chain`] are joined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum ChainKind {
    /// Run members in sequence, aborting on the first failure.
    #[strum(serialize = "&&")]
    And,
    /// Feed each member's stdout into the next member's stdin.
    #[strum(serialize = "|")]
    Pipe,
    /// Append each member to the previous one's arguments after a `--`
    /// separator, e.g. `sudo -- gem install bundler`.
    #[strum(serialize = "--")]
    Wrap,
}

impl ChainKind {
    /// Returns the token placed between rendered members.
    pub fn separator(self) -> String {
        format!(" {self} ")
    }
}

/// An ordered composition of commands under one join semantics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    kind: ChainKind,
    members: Vec<Command>,
    display_name: Option<String>,
}

impl Chain {
    /// Creates a chain of the given kind.
    ///
    /// # Arguments
    ///
    /// * `kind` - How members are joined.
    /// * `members` - The initial members, in order.
    pub fn new(kind: ChainKind, members: impl IntoIterator<Item = Command>) -> Self {
        Self {
            kind,
            members: members.into_iter().collect(),
            display_name: None,
        }
    }

    /// Returns how members are joined.
    pub const fn kind(&self) -> ChainKind {
        self.kind
    }

    /// Returns the chain's members.
    pub fn members(&self) -> &[Command] {
        &self.members
    }

    /// Appends a member.
    pub fn add(&mut self, member: impl Into<Command>) -> &mut Self {
        self.members.push(member.into());
        self
    }

    /// Overrides the name used in diagnostics.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Returns the name used in diagnostics: the override, or the last member's name.
    pub fn name(&self) -> &str {
        match (&self.display_name, self.members.last()) {
            (Some(name), _) => name.as_str(),
            (None, Some(last)) => last.name(),
            (None, None) => "",
        }
    }

    /// Renders each member and joins them with the kind's separator.
    pub fn command(&self) -> String {
        self.members
            .iter()
            .map(Command::command)
            .join(&self.kind.separator())
    }

    /// Returns the union of the members' environments. Members are merged
    /// last-to-first, so the earliest member that sets a key wins it.
    pub fn environment(&self) -> IndexMap<String, String> {
        let mut environment = IndexMap::new();
        for member in self.members.iter().rev() {
            environment.extend(member.environment());
        }
        environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::CommandSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn joins_with_kind_separator() {
        let members = || {
            [
                Command::from(CommandSpec::with_args("cat", ["/etc/passwd"])),
                Command::from(["grep", "root"]),
            ]
        };

        assert_eq!(
            Chain::new(ChainKind::Pipe, members()).command(),
            "cat /etc/passwd | grep root"
        );
        assert_eq!(
            Chain::new(ChainKind::And, members()).command(),
            "cat /etc/passwd && grep root"
        );
        assert_eq!(
            Chain::new(ChainKind::Wrap, members()).command(),
            "cat /etc/passwd -- grep root"
        );
    }

    #[test]
    fn name_defaults_to_last_member() {
        let mut chain = Chain::new(ChainKind::Pipe, [Command::from("env")]);
        chain.add("cat");
        assert_eq!(chain.name(), "cat");
        assert_eq!(chain.named("dump").name(), "dump");
    }

    #[test]
    fn earliest_member_wins_environment_conflicts() {
        let first = CommandSpec::new("env").env("X", "a1").env("S", "a");
        let second = CommandSpec::new("cat").env("S", "b").env("Y", "2");
        let chain = Chain::new(ChainKind::Pipe, [first.into(), second.into()]);

        let environment: Vec<_> = chain.environment().into_iter().collect();
        assert_eq!(
            environment,
            vec![
                ("S".to_owned(), "a".to_owned()),
                ("Y".to_owned(), "2".to_owned()),
                ("X".to_owned(), "a1".to_owned()),
            ]
        );
    }
}
