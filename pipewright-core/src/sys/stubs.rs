//! Stubs for platforms without the facilities the collector needs.

pub(crate) mod exit {
    use crate::error;

    pub(crate) fn register_exit_hook(_hook: extern "C" fn()) -> Result<(), error::Error> {
        error::unsupported("exit hooks")
    }
}

pub(crate) mod pipes {
    pub(crate) use os_pipe::{PipeReader, pipe};

    use crate::error;

    pub(crate) fn set_nonblocking(_reader: &PipeReader) -> Result<(), error::Error> {
        error::unsupported("non-blocking pipes")
    }
}

pub(crate) mod poll {
    use std::time::Duration;

    use crate::error;
    use crate::sys::pipes::PipeReader;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) enum Readiness {
        Idle,
        Readable,
        Errored,
    }

    pub(crate) fn wait_readable(
        _readers: &[&PipeReader],
        _timeout: Duration,
    ) -> Result<Vec<Readiness>, error::Error> {
        error::unsupported("readiness polling")
    }
}

pub(crate) mod process {
    pub(crate) fn exit_code(status: std::process::ExitStatus) -> i32 {
        status.code().unwrap_or(-1)
    }
}

pub(crate) mod signal {
    use crate::error;

    pub(crate) fn interrupt_process(_pid: u32) -> Result<(), error::Error> {
        error::unsupported("sending signals")
    }
}
