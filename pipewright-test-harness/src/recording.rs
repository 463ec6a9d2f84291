//! Recording real executions so they can be replayed by the mock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pipewright_core::{Command, CommandResult, EnvScope, Error, Executor, StreamId};

/// Environment variable naming the file a recording is written to.
pub const RECORDING_PATH_VAR: &str = "PIPEWRIGHT_CMDREC";

/// One recorded execution.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct RecordedCommand {
    /// The rendered `string_format()` of the command.
    pub command: String,
    /// The exit code it returned.
    pub exit_code: i32,
    /// Captured stream contents, lossily decoded.
    #[serde(default)]
    pub streams: BTreeMap<StreamId, String>,
}

impl From<&CommandResult> for RecordedCommand {
    fn from(result: &CommandResult) -> Self {
        Self {
            command: result.command().to_owned(),
            exit_code: result.exit_code(),
            streams: result
                .streams()
                .iter()
                .map(|(id, bytes)| (*id, String::from_utf8_lossy(bytes).into_owned()))
                .collect(),
        }
    }
}

/// Wraps another executor and records every command it runs along with the
/// result.
pub struct RecordingExecutor<E> {
    inner: E,
    recorded: Mutex<Vec<RecordedCommand>>,
}

impl<E: Executor> RecordingExecutor<E> {
    /// Wraps `inner`.
    pub const fn new(inner: E) -> Self {
        Self {
            inner,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Returns everything recorded so far.
    pub fn recording(&self) -> Vec<RecordedCommand> {
        self.recorded
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }

    /// Writes the recording as YAML.
    pub fn emit(&self, writer: impl std::io::Write) -> anyhow::Result<()> {
        serde_yaml::to_writer(writer, &self.recording())?;
        Ok(())
    }

    /// Writes the recording to `path`, or, when no path is given, to the path
    /// named by [`RECORDING_PATH_VAR`]. Returns the path written, if any.
    pub fn emit_to(&self, path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(RECORDING_PATH_VAR) {
                Some(path) => PathBuf::from(path),
                None => {
                    tracing::warn!("set {RECORDING_PATH_VAR} to write the command recording to a path");
                    return Ok(None);
                }
            },
        };

        let file = std::fs::File::create(&path)?;
        self.emit(file)?;
        Ok(Some(path))
    }
}

impl<E: Executor> Executor for RecordingExecutor<E> {
    fn execute_in(&self, command: &Command, env: &EnvScope) -> Result<CommandResult, Error> {
        let result = self.inner.execute_in(command, env)?;
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedCommand::from(&result));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockExecutor, MockResult};
    use pipewright_core::CommandSpec;
    use pretty_assertions::assert_eq;

    fn scripted() -> MockExecutor {
        let mock = MockExecutor::new();
        mock.expect_command("git status", (0, "clean"))
            .expect_command("TEST_ENV=1 make", 2);
        mock
    }

    #[test]
    fn records_and_replays() -> anyhow::Result<()> {
        let recorder = RecordingExecutor::new(scripted());
        recorder.execute(&CommandSpec::with_args("git", ["status"]).into())?;
        recorder.execute(&CommandSpec::new("make").env("TEST_ENV", "1").into())?;

        let recording = recorder.recording();
        assert_eq!(recording.len(), 2);
        assert_eq!(recording[0].streams[&1], "clean");

        let mut yaml = Vec::new();
        recorder.emit(&mut yaml)?;

        let replay = MockExecutor::from_recording(yaml.as_slice())?;
        let first = replay.execute(&CommandSpec::with_args("git", ["status"]).into())?;
        assert_eq!(first.stdout(), "clean");
        let second = replay.execute(&CommandSpec::new("make").env("TEST_ENV", "1").into())?;
        assert_eq!(second.exit_code(), 2);
        replay.verify()?;

        Ok(())
    }

    #[test]
    fn emits_to_explicit_path() -> anyhow::Result<()> {
        let mock = MockExecutor::new();
        mock.expect_command("true", MockResult::create(0));
        let recorder = RecordingExecutor::new(mock);
        recorder.execute(&Command::from("true"))?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("commands.yaml");
        let written = recorder.emit_to(Some(&path))?;

        assert_eq!(written.as_deref(), Some(path.as_path()));
        let replay = MockExecutor::from_recording(std::fs::File::open(&path)?)?;
        assert!(replay.succeeds(&Command::from("true"))?);

        Ok(())
    }
}
