//! Logging shim for the crate.
//!
//! When the `tracing` feature is enabled the macros forward to the
//! equally named `tracing` ones; otherwise they compile to nothing while
//! still type checking their arguments.

#[cfg(feature = "tracing")]
pub(crate) use tracing::debug;
#[cfg(feature = "tracing")]
pub(crate) use tracing::warn;

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($args:tt)*) => {{
        if false {
            let _ = format_args!($($args)*);
        }
    }};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($args:tt)*) => {{
        if false {
            let _ = format_args!($($args)*);
        }
    }};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {debug, warn};
