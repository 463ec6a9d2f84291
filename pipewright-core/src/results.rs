//! Encapsulation of command run results.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error;

/// Identifies a standard stream by its file descriptor number.
pub type StreamId = u32;

/// Standard input.
pub const STDIN: StreamId = 0;
/// Standard output.
pub const STDOUT: StreamId = 1;
/// Standard error.
pub const STDERR: StreamId = 2;

/// The complete outcome of running a command: its exit code and captured
/// output. A result only exists once its process has been waited on and all
/// of its output drained, so it is immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResult {
    command: String,
    process_id: Option<u32>,
    exit_code: i32,
    streams: BTreeMap<StreamId, Vec<u8>>,
}

impl CommandResult {
    /// Assembles a completed result.
    ///
    /// # Arguments
    ///
    /// * `command` - The command representation used in diagnostics.
    /// * `process_id` - The ID of the process that ran, if there was one.
    /// * `exit_code` - The process's exit code.
    /// * `streams` - Captured content, keyed by stream.
    pub fn new(
        command: impl Into<String>,
        process_id: Option<u32>,
        exit_code: i32,
        streams: BTreeMap<StreamId, Vec<u8>>,
    ) -> Self {
        Self {
            command: command.into(),
            process_id,
            exit_code,
            streams,
        }
    }

    /// Returns the command representation this result belongs to.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the ID the process ran as; retained for diagnostics only.
    pub const fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    /// Returns the process's exit code. Processes terminated by a signal
    /// report `128 + signal`.
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Returns all captured streams.
    pub const fn streams(&self) -> &BTreeMap<StreamId, Vec<u8>> {
        &self.streams
    }

    /// Returns the raw bytes captured from the given stream.
    pub fn stream_bytes(&self, stream: StreamId) -> &[u8] {
        self.streams.get(&stream).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns captured standard output, lossily decoded.
    pub fn stdout(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.stream_bytes(STDOUT))
    }

    /// Returns captured standard error, lossily decoded.
    pub fn stderr(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.stream_bytes(STDERR))
    }

    /// Returns whether the command exited with code 0. Never fails.
    pub fn succeeded(&self) -> bool {
        self.must_succeed().is_ok()
    }

    /// Returns the exit code if it is 0; otherwise fails with a diagnostic
    /// embedding the command and both captured streams.
    pub fn must_succeed(&self) -> Result<i32, error::Error> {
        match self.exit_code {
            0 => Ok(0),
            exit_code => Err(error::Error::CommandFailed {
                command: self.command.clone(),
                exit_code,
                streams: self.format_streams(),
            }),
        }
    }

    /// Renders stdout then stderr, each labelled, with an explicit `[empty]`
    /// marker for empty streams.
    pub fn format_streams(&self) -> String {
        format!(
            "stdout:{}stderr:{}---",
            format_stream(&self.stdout()),
            format_stream(&self.stderr())
        )
    }
}

fn format_stream(content: &str) -> String {
    if content.is_empty() {
        "[empty]\n".to_owned()
    } else {
        format!("\n{content}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result_with(exit_code: i32, stdout: &str, stderr: &str) -> CommandResult {
        let mut streams = BTreeMap::new();
        streams.insert(STDOUT, stdout.as_bytes().to_vec());
        streams.insert(STDERR, stderr.as_bytes().to_vec());
        CommandResult::new("make all", Some(42), exit_code, streams)
    }

    #[test]
    fn zero_exit_succeeds() {
        let result = result_with(0, "built\n", "");
        assert!(result.succeeded());
        assert_eq!(result.must_succeed().ok(), Some(0));
        assert_eq!(result.stdout(), "built\n");
        assert_eq!(result.process_id(), Some(42));
    }

    #[test]
    fn nonzero_exit_fails_with_diagnostic() {
        let result = result_with(2, "", "no rule to make target\n");
        assert!(!result.succeeded());

        let message = result.must_succeed().unwrap_err().to_string();
        assert_eq!(
            message,
            "Command \"make all\" failed with exit status 2: \n\
             stdout:[empty]\nstderr:\nno rule to make target\n---"
        );
    }

    #[test]
    fn format_streams_marks_empty_streams() {
        let result = CommandResult::new("true", None, 0, BTreeMap::new());
        assert_eq!(result.format_streams(), "stdout:[empty]\nstderr:[empty]\n---");
        assert!(result.stream_bytes(STDOUT).is_empty());
    }
}
