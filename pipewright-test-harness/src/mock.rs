//! An executor that hands back canned results instead of running processes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use pipewright_core::{Command, CommandResult, EnvScope, Error, Executor, STDOUT, StreamId};

use crate::recording::RecordedCommand;

/// A canned command outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockResult {
    exit_code: i32,
    streams: BTreeMap<StreamId, String>,
}

impl MockResult {
    /// A result with the given exit code and empty stdout.
    pub fn create(exit_code: i32) -> Self {
        Self::with_stdout(exit_code, "")
    }

    /// A result with the given exit code and stdout text.
    pub fn with_stdout(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            streams: BTreeMap::from([(STDOUT, stdout.into())]),
        }
    }

    /// A result with the given exit code and explicit stream contents.
    pub const fn with_streams(exit_code: i32, streams: BTreeMap<StreamId, String>) -> Self {
        Self { exit_code, streams }
    }

    /// Returns the canned exit code.
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    fn to_result(&self, command: String) -> CommandResult {
        let streams = self
            .streams
            .iter()
            .map(|(id, content)| (*id, content.clone().into_bytes()))
            .collect();
        CommandResult::new(command, None, self.exit_code, streams)
    }
}

impl From<i32> for MockResult {
    fn from(exit_code: i32) -> Self {
        Self::create(exit_code)
    }
}

impl From<(i32, &str)> for MockResult {
    fn from((exit_code, stdout): (i32, &str)) -> Self {
        Self::with_stdout(exit_code, stdout)
    }
}

impl From<(i32, BTreeMap<StreamId, String>)> for MockResult {
    fn from((exit_code, streams): (i32, BTreeMap<StreamId, String>)) -> Self {
        Self::with_streams(exit_code, streams)
    }
}

/// Matches the rendered `string_format()` of a command.
#[derive(Clone, Debug)]
pub enum CommandPattern {
    /// The rendered command must equal this text.
    Exact(String),
    /// The rendered command must match this regex somewhere.
    Regex(regex::Regex),
}

impl CommandPattern {
    /// Compiles a regex pattern.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(regex::Regex::new(pattern)?))
    }

    /// Returns whether the rendered command matches.
    pub fn matches(&self, rendered: &str) -> bool {
        match self {
            Self::Exact(text) => text == rendered,
            Self::Regex(regex) => regex.is_match(rendered),
        }
    }
}

impl std::fmt::Display for CommandPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(text) => write!(f, "{text:?}"),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<&str> for CommandPattern {
    fn from(text: &str) -> Self {
        Self::Exact(text.to_owned())
    }
}

impl From<String> for CommandPattern {
    fn from(text: String) -> Self {
        Self::Exact(text)
    }
}

impl From<regex::Regex> for CommandPattern {
    fn from(regex: regex::Regex) -> Self {
        Self::Regex(regex)
    }
}

/// A command the mock was asked to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedCommand {
    /// The rendered `string_format()`.
    pub command: String,
    /// The environment scope it was run in.
    pub env: EnvScope,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<(CommandPattern, MockResult)>,
    any_commands: Option<MockResult>,
    executed: Vec<ExecutedCommand>,
    rejections: Vec<String>,
}

/// An [`Executor`] that satisfies commands from an ordered queue of
/// expectations.
///
/// Each command must match the pattern at the head of the queue, which is
/// then consumed. After [`MockExecutor::expect_some_commands`], commands that
/// do not match the head succeed with exit code 0 instead of being rejected.
/// Call [`MockExecutor::verify`] at the end of a test.
#[derive(Default)]
pub struct MockExecutor {
    state: Mutex<MockState>,
}

impl MockExecutor {
    /// Creates a mock with no expectations; any command is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that replays a YAML recording written by
    /// [`crate::RecordingExecutor`], in order.
    pub fn from_recording(reader: impl std::io::Read) -> anyhow::Result<Self> {
        let recorded: Vec<RecordedCommand> = serde_yaml::from_reader(reader)?;
        let mock = Self::new();
        for entry in recorded {
            mock.expect_command(
                entry.command.as_str(),
                MockResult::with_streams(entry.exit_code, entry.streams),
            );
        }
        Ok(mock)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A test that panicked while holding the lock has already failed.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Expects the next command to match `pattern`, answering it with `result`.
    pub fn expect_command(
        &self,
        pattern: impl Into<CommandPattern>,
        result: impl Into<MockResult>,
    ) -> &Self {
        self.state()
            .expectations
            .push_back((pattern.into(), result.into()));
        self
    }

    /// Accepts any number of otherwise unexpected commands, each exiting 0.
    pub fn expect_some_commands(&self) -> &Self {
        self.state().any_commands = Some(MockResult::create(0));
        self
    }

    /// Returns every command run so far, in order.
    pub fn executed(&self) -> Vec<ExecutedCommand> {
        self.state().executed.clone()
    }

    /// Fails if any expectation was not consumed or any command was rejected.
    pub fn verify(&self) -> anyhow::Result<()> {
        let state = self.state();

        if let Some(rejected) = state.rejections.first() {
            anyhow::bail!(
                "{} unexpected command(s); first: {rejected}",
                state.rejections.len()
            );
        }

        if !state.expectations.is_empty() {
            let remaining: Vec<String> = state
                .expectations
                .iter()
                .map(|(pattern, _)| pattern.to_string())
                .collect();
            anyhow::bail!("expected commands were never run: {}", remaining.join(", "));
        }

        Ok(())
    }
}

impl Executor for MockExecutor {
    fn execute_in(&self, command: &Command, env: &EnvScope) -> Result<CommandResult, Error> {
        let rendered = command.string_format();
        let mut state = self.state();

        state.executed.push(ExecutedCommand {
            command: rendered.clone(),
            env: env.clone(),
        });

        let head_matches = state
            .expectations
            .front()
            .is_some_and(|(pattern, _)| pattern.matches(&rendered));

        if head_matches {
            if let Some((_, result)) = state.expectations.pop_front() {
                return Ok(result.to_result(rendered));
            }
        }

        if let Some(result) = &state.any_commands {
            return Ok(result.to_result(rendered));
        }

        let message = match state.expectations.front() {
            Some((pattern, _)) => format!("'{rendered}' (expected {pattern})"),
            None => format!("'{rendered}' (no commands expected)"),
        };
        tracing::debug!("mock rejected {message}");
        state.rejections.push(message.clone());

        Err(Error::Rejected(message))
    }
}
