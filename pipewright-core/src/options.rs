//! Options controlling how commands are spawned and collected.

use std::time::Duration;

/// How a command is turned into a process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpawnMode {
    /// Exec a plain command line directly, split on whitespace, and pass
    /// anything with shell syntax (metacharacters, redirections, chains,
    /// escaped commands) to the shell.
    #[default]
    Shell,
    /// Exec `[executable] + arguments` verbatim with no shell. Only bare specs
    /// without redirections qualify; anything else still goes through the
    /// shell.
    Direct,
}

/// Options for the output collection loop.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CollectorOptions {
    /// Upper bound on a single wait for stream readability, in milliseconds.
    pub poll_interval_ms: u64,
    /// Time after spawn at which output stops being buffered and starts being
    /// echoed live, in milliseconds.
    pub echo_after_ms: u64,
    /// Immediate re-reads attempted when a stream reported ready would block.
    pub immediate_retries: u32,
    /// Size of each non-blocking read.
    pub read_chunk_size: usize,
    /// Whether output of long-running commands is echoed at all.
    pub echo_long_running: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            echo_after_ms: 3000,
            immediate_retries: 3,
            read_chunk_size: 4096,
            echo_long_running: true,
        }
    }
}

impl CollectorOptions {
    /// Returns the readability wait bound.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the echo deadline, relative to spawn.
    pub const fn echo_after(&self) -> Duration {
        Duration::from_millis(self.echo_after_ms)
    }
}

/// Options for [`crate::ProcessExecutor`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutorOptions {
    /// Echo each command before it runs and its exit code after.
    pub verbose: bool,
    /// How commands become processes.
    pub spawn_mode: SpawnMode,
    /// The shell that runs commands needing shell syntax.
    pub shell: String,
    /// Let children read the parent's stdin instead of `/dev/null`.
    pub inherit_stdin: bool,
    /// Collection loop tuning.
    pub collector: CollectorOptions,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            spawn_mode: SpawnMode::default(),
            shell: "/bin/sh".to_owned(),
            inherit_stdin: false,
            collector: CollectorOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let options = ExecutorOptions::default();
        assert_eq!(options.spawn_mode, SpawnMode::Shell);
        assert_eq!(options.collector.poll_interval(), Duration::from_secs(1));
        assert_eq!(options.collector.echo_after(), Duration::from_secs(3));
        assert_eq!(options.collector.immediate_retries, 3);
    }
}
