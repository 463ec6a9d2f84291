//! Scoped environment overrides applied to a single spawn.
//!
//! The parent process's environment is never modified; a scope only changes
//! what one child sees.

use indexmap::IndexMap;

/// Environment changes applied on top of the parent's environment for one spawn.
///
/// Resolution order for the child is: the parent's environment, minus
/// `removals`, plus `overrides`, plus the command's own environment. The
/// command's keys win every conflict.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvScope {
    overrides: IndexMap<String, String>,
    removals: Vec<String>,
}

impl EnvScope {
    /// Returns a scope that inherits the parent's environment unchanged.
    pub fn inherit() -> Self {
        Self::default()
    }

    /// Sets a variable for the child.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Hides a variable of the parent's from the child.
    #[must_use]
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.removals.push(key.into());
        self
    }

    /// Hides each of the given variables from the child.
    #[must_use]
    pub fn remove_all<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.removals.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Returns the variables this scope sets.
    pub const fn overrides(&self) -> &IndexMap<String, String> {
        &self.overrides
    }

    /// Returns the variables this scope hides.
    pub fn removals(&self) -> &[String] {
        &self.removals
    }

    /// Returns whether the scope changes nothing.
    pub fn is_inherit(&self) -> bool {
        self.overrides.is_empty() && self.removals.is_empty()
    }

    /// Applies the scope and then the command's own environment to a process builder.
    pub(crate) fn apply(
        &self,
        builder: &mut std::process::Command,
        command_env: &IndexMap<String, String>,
    ) {
        for key in &self.removals {
            builder.env_remove(key);
        }
        builder.envs(&self.overrides);
        builder.envs(command_env);
    }

    /// Computes the environment a child would see given a parent environment.
    pub fn resolve<I>(
        &self,
        parent: I,
        command_env: &IndexMap<String, String>,
    ) -> IndexMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut resolved: IndexMap<String, String> = parent
            .into_iter()
            .filter(|(key, _)| !self.removals.contains(key))
            .collect();
        resolved.extend(self.overrides.clone());
        resolved.extend(command_env.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parent() -> Vec<(String, String)> {
        vec![
            ("PATH".to_owned(), "/bin".to_owned()),
            ("RUBYOPT".to_owned(), "-rbundler/setup".to_owned()),
            ("MODE".to_owned(), "parent".to_owned()),
        ]
    }

    #[test]
    fn inherit_changes_nothing() {
        let scope = EnvScope::inherit();
        assert!(scope.is_inherit());
        let resolved = scope.resolve(parent(), &IndexMap::new());
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn command_keys_win_over_scope_and_parent() {
        let scope = EnvScope::inherit()
            .remove("RUBYOPT")
            .set("MODE", "scope");
        let mut command_env = IndexMap::new();
        command_env.insert("MODE".to_owned(), "command".to_owned());

        let resolved = scope.resolve(parent(), &command_env);
        assert_eq!(resolved.get("MODE").map(String::as_str), Some("command"));
        assert!(!resolved.contains_key("RUBYOPT"));
        assert_eq!(resolved.get("PATH").map(String::as_str), Some("/bin"));
    }
}
