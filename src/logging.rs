//! Logging facade for the navigator.
//!
//! Every diagnostic the router emits goes through the five macros below.
//! Each one forwards to [`log`](https://docs.rs/log) or
//! [`tracing`](https://docs.rs/tracing), selected at compile time:
//!
//! | Feature    | Backend         | Default |
//! |------------|-----------------|---------|
//! | `log`      | `log` crate     | yes     |
//! | `tracing`  | `tracing` crate | no      |
//!
//! Enable at most one backend. With neither enabled the macros expand to
//! nothing, which is what a size-constrained wasm build usually wants.
//!
//! The router uses the levels consistently:
//!
//! - `trace_log!`: cache hits and misses, per-region replace/skip decisions.
//! - `debug_log!`: phase changes, superseded navigations, prefetches.
//! - `info_log!`: navigation start and completion, init and dispose.
//! - `warn_log!`: fallbacks to a full browser navigation.
//! - `error_log!`: asset load failures.
//!
//! ```ignore
//! use fragment_navigator::{debug_log, warn_log};
//!
//! debug_log!("Navigation to '{}' superseded", url);
//! warn_log!("Falling back to full navigation: {}", url);
//! ```
//!
//! In the browser build, output reaches the console through whatever
//! logger the host page installs; the router never installs one itself.

/// Emit a **trace**-level message through the enabled backend.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
        #[cfg(feature = "log")]
        ::log::trace!($($arg)*);
    };
}

/// Emit a **debug**-level message through the enabled backend.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
        #[cfg(feature = "log")]
        ::log::debug!($($arg)*);
    };
}

/// Emit an **info**-level message through the enabled backend.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::info!($($arg)*);
        #[cfg(feature = "log")]
        ::log::info!($($arg)*);
    };
}

/// Emit a **warn**-level message through the enabled backend.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!($($arg)*);
        #[cfg(feature = "log")]
        ::log::warn!($($arg)*);
    };
}

/// Emit an **error**-level message through the enabled backend.
///
/// Errors that the router surfaces to subscribers (see
/// [`RouterEvents::on_error`](crate::events::RouterEvents::on_error)) are
/// also logged here, so a page without subscribers still sees them.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::error!($($arg)*);
        #[cfg(feature = "log")]
        ::log::error!($($arg)*);
    };
}
