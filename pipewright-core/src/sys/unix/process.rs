//! Process status utilities

use std::os::unix::process::ExitStatusExt;

/// Converts an exit status into a shell-style exit code: the process's own
/// code, or `128 + signal` for processes terminated by a signal.
pub(crate) fn exit_code(status: std::process::ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}
