//! Pipe utilities.

use std::os::fd::AsFd;

use nix::fcntl::{FcntlArg, OFlag, fcntl};

pub(crate) use os_pipe::{PipeReader, pipe};

use crate::error;

/// Switches the read end of a pipe to non-blocking mode, so that reads
/// report `WouldBlock` instead of waiting for data.
pub(crate) fn set_nonblocking(reader: &PipeReader) -> Result<(), error::Error> {
    let flags = OFlag::from_bits_truncate(fcntl(reader.as_fd(), FcntlArg::F_GETFL)?);
    fcntl(reader.as_fd(), FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}
