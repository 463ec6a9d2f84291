//! Platform abstraction facilities

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub(crate) mod unix;
        pub(crate) use unix as platform;
    } else {
        pub(crate) mod stubs;
        pub(crate) use stubs as platform;
    }
}

pub(crate) use platform::exit;
pub(crate) use platform::pipes;
pub(crate) use platform::poll;
pub(crate) use platform::process;
pub(crate) use platform::signal;
