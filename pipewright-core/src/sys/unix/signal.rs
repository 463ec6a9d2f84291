use crate::error;

/// Sends SIGINT to the given process.
pub(crate) fn interrupt_process(pid: u32) -> Result<(), error::Error> {
    let pid = i32::try_from(pid).map_err(|_| nix::errno::Errno::ESRCH)?;
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid),
        nix::sys::signal::Signal::SIGINT,
    )?;
    Ok(())
}
