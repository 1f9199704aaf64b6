//! Internal logging macros.
//!
//! Each forwards to the matching `tracing` macro when the `logging` feature
//! is on and expands to nothing otherwise, so call sites stay free of
//! `#[cfg]` noise.

macro_rules! log_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        ::tracing::trace!($($arg)*);
    };
}

macro_rules! log_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        ::tracing::debug!($($arg)*);
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        ::tracing::warn!($($arg)*);
    };
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        ::tracing::error!($($arg)*);
    };
}

pub(crate) use {log_debug, log_error, log_trace, log_warn};
