//! Readiness polling across multiple pipe readers.

use std::os::fd::AsFd;
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::error;
use crate::sys::pipes::PipeReader;

/// Readiness of one polled stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// Nothing to read yet.
    Idle,
    /// Data or end-of-file is available.
    Readable,
    /// The kernel reported an error condition on the descriptor.
    Errored,
}

/// Waits up to `timeout` for any of `readers` to become readable.
///
/// Returns one [`Readiness`] per reader, in order. A timeout or an interrupted
/// wait reports every reader as idle; callers recompute their deadlines and
/// wait again.
pub(crate) fn wait_readable(
    readers: &[&PipeReader],
    timeout: Duration,
) -> Result<Vec<Readiness>, error::Error> {
    let mut poll_fds: Vec<PollFd<'_>> = readers
        .iter()
        .map(|reader| PollFd::new(reader.as_fd(), PollFlags::POLLIN))
        .collect();

    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    let poll_timeout = PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::MAX);

    match poll(&mut poll_fds, poll_timeout) {
        Ok(0) | Err(nix::errno::Errno::EINTR) => Ok(vec![Readiness::Idle; readers.len()]),
        Ok(_) => Ok(poll_fds
            .iter()
            .map(|poll_fd| readiness(poll_fd.revents().unwrap_or(PollFlags::empty())))
            .collect()),
        Err(e) => Err(e.into()),
    }
}

/// Classifies the events `poll` returned for one descriptor.
fn readiness(revents: PollFlags) -> Readiness {
    if revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
        Readiness::Errored
    } else if revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP) {
        // POLLHUP without POLLIN is EOF; report readable so the caller reads
        // and observes it.
        Readiness::Readable
    } else {
        Readiness::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_conditions_win() {
        assert_eq!(readiness(PollFlags::POLLNVAL), Readiness::Errored);
        assert_eq!(readiness(PollFlags::POLLERR), Readiness::Errored);
        assert_eq!(
            readiness(PollFlags::POLLERR | PollFlags::POLLIN),
            Readiness::Errored
        );
    }

    #[test]
    fn hangup_is_readable() {
        assert_eq!(readiness(PollFlags::POLLIN), Readiness::Readable);
        assert_eq!(readiness(PollFlags::POLLHUP), Readiness::Readable);
        assert_eq!(readiness(PollFlags::empty()), Readiness::Idle);
    }

    #[test]
    fn closed_writer_polls_readable() -> Result<(), error::Error> {
        let (reader, writer) = crate::sys::pipes::pipe()?;
        drop(writer);

        let ready = wait_readable(&[&reader], Duration::from_millis(100))?;
        assert_eq!(ready, vec![Readiness::Readable]);

        Ok(())
    }
}
