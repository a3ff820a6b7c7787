//! Internal logging macros that forward to `tracing` when the feature is enabled.
//!
//! With the `tracing` feature disabled every call site compiles to nothing, so retry and
//! failover logging carries no runtime cost for users who don't need it. All events are
//! emitted under the `fallback_provider` target.

macro_rules! emit {
    ($level:ident, $($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::$level!(target: "fallback_provider", $($arg)*)
    };
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { emit!(error, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { emit!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { emit!(info, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { emit!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { emit!(trace, $($arg)*) };
}
