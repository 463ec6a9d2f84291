pub(crate) mod exit;
pub(crate) mod pipes;
pub(crate) mod poll;
pub(crate) mod process;
pub(crate) mod signal;
