//! Command tasks built on `pipewright-core`.
//!
//! A [`CommandTask`] runs one command through an
//! [`Executor`](pipewright_core::Executor), skipping it when an optional
//! verification command succeeds. Decorations change how both commands run:
//! [`RemoteCommandTask`] wraps them in `ssh`, and [`BundleCommandTask`] runs
//! them without the caller's Bundler environment.

mod decoration;
mod deferred;
mod error;
mod task;

pub use decoration::{BUNDLER_ENV_VARS, Bundle, Decorate, Invocation, Plain, Remote, RemoteServer};
pub use deferred::Deferred;
pub use error::TaskError;
pub use task::{BundleCommandTask, CommandTask, RemoteCommandTask};
