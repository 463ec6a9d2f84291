//! Process exit hooks.

use crate::error;

/// Arranges for `hook` to run when the current process exits normally.
pub(crate) fn register_exit_hook(hook: extern "C" fn()) -> Result<(), error::Error> {
    // SAFETY: `atexit` only records the function pointer; `hook` is a plain
    // `extern "C"` function that takes no arguments, as `atexit` requires.
    let rc = unsafe { nix::libc::atexit(hook) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::other("failed to register exit hook").into())
    }
}
