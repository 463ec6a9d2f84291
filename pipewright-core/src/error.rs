//! Error facilities

use crate::results::StreamId;

/// Monolithic error type for command construction, spawning, and collection.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The OS could not create the child process (bad executable, permissions,
    /// resource exhaustion).
    #[error("failed to spawn command '{command}': {source}")]
    SpawnFailed {
        /// The rendered command that was being spawned.
        command: String,
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// The command ran to completion but returned a non-zero exit code.
    #[error("Command {command:?} failed with exit status {exit_code}: \n{streams}")]
    CommandFailed {
        /// The rendered command.
        command: String,
        /// The exit code the command returned.
        exit_code: i32,
        /// The formatted captured output of the command.
        streams: String,
    },

    /// An error condition was reported on a watched output stream.
    #[error("error condition reported on output stream {stream}")]
    StreamError {
        /// Identifies the offending stream.
        stream: StreamId,
    },

    /// An executor refused to run the given command.
    #[error("command rejected by executor: {0}")]
    Rejected(String),

    /// A command was built with no executable.
    #[error("command has no executable")]
    EmptyCommand,

    /// The requested functionality is not available on this platform.
    #[error("not supported on this platform: {0}")]
    UnsupportedPlatform(&'static str),

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// A threading error occurred.
    #[error("threading error")]
    ThreadingError(#[from] tokio::task::JoinError),

    /// A system error occurred.
    #[cfg(unix)]
    #[error("system error: {0}")]
    ErrnoError(#[from] nix::errno::Errno),
}

impl Error {
    /// Returns whether this error reports a command that ran and exited with a
    /// non-zero status, as opposed to one that could not be run at all.
    pub const fn is_command_failure(&self) -> bool {
        matches!(self, Self::CommandFailed { .. })
    }
}

/// Convenience function for returning an error for functionality missing on
/// the current platform.
///
/// # Arguments
///
/// * `what` - Describes the missing functionality.
#[allow(dead_code)]
pub(crate) fn unsupported<T>(what: &'static str) -> Result<T, Error> {
    Err(Error::UnsupportedPlatform(what))
}
