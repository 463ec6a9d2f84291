//! Error facilities

/// Errors raised while configuring or running a task.
#[derive(thiserror::Error, Debug)]
pub enum TaskError {
    /// A remote task has no server address.
    #[error("need remote server for task '{0}'")]
    MissingRemoteServer(String),

    /// A remote task was given nothing to run on the server.
    #[error("empty remote command for task '{0}'")]
    EmptyRemoteCommand(String),

    /// Running a command failed, or it exited non-zero where success was required.
    #[error(transparent)]
    Command(#[from] pipewright_core::Error),
}
