//! Test doubles for code that runs commands through a
//! [`pipewright_core::Executor`].
//!
//! [`MockExecutor`] answers commands from an ordered queue of expectations
//! and fails verification when commands are missing or unexpected.
//! [`RecordingExecutor`] captures real executions as YAML that the mock can
//! replay later.

mod mock;
mod recording;

pub use mock::{CommandPattern, ExecutedCommand, MockExecutor, MockResult};
pub use recording::{RECORDING_PATH_VAR, RecordedCommand, RecordingExecutor};
