//! Logging macros.
//!
//! Each macro takes a [`SimulationContext`](crate::SimulationContext) (or anything with `time()` and
//! `name()` methods) and prefixes the message with the current tick, the level and the component name,
//! e.g. `[42 DEBUG pump] valve opened`. The component name is also used as the log target, so output can
//! be filtered per component, e.g. `RUST_LOG=pump=trace`.
//!
//! The macros emit records through the [`log`](https://docs.rs/log) facade, so the calling crate must
//! depend on `log` and install a logger such as `env_logger`.

/// Logs a message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $msg:expr) => (
        ::log::trace!(
            target: $ctx.name(),
            "[{} {} {}] {}",
            $ctx.time(),
            $crate::colored::Colorize::cyan("TRACE"),
            $ctx.name(),
            $msg
        )
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        ::log::trace!(
            target: $ctx.name(),
            concat!("[{} {} {}] ", $format),
            $ctx.time(),
            $crate::colored::Colorize::cyan("TRACE"),
            $ctx.name(),
            $($arg)+
        )
    );
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $msg:expr) => (
        ::log::debug!(
            target: $ctx.name(),
            "[{} {} {}] {}",
            $ctx.time(),
            $crate::colored::Colorize::blue("DEBUG"),
            $ctx.name(),
            $msg
        )
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        ::log::debug!(
            target: $ctx.name(),
            concat!("[{} {} {}] ", $format),
            $ctx.time(),
            $crate::colored::Colorize::blue("DEBUG"),
            $ctx.name(),
            $($arg)+
        )
    );
}

/// Logs a message at the info level.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $msg:expr) => (
        ::log::info!(
            target: $ctx.name(),
            "[{} {} {}] {}",
            $ctx.time(),
            $crate::colored::Colorize::green("INFO "),
            $ctx.name(),
            $msg
        )
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        ::log::info!(
            target: $ctx.name(),
            concat!("[{} {} {}] ", $format),
            $ctx.time(),
            $crate::colored::Colorize::green("INFO "),
            $ctx.name(),
            $($arg)+
        )
    );
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $msg:expr) => (
        ::log::warn!(
            target: $ctx.name(),
            "[{} {} {}] {}",
            $ctx.time(),
            $crate::colored::Colorize::yellow("WARN "),
            $ctx.name(),
            $msg
        )
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        ::log::warn!(
            target: $ctx.name(),
            concat!("[{} {} {}] ", $format),
            $ctx.time(),
            $crate::colored::Colorize::yellow("WARN "),
            $ctx.name(),
            $($arg)+
        )
    );
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $msg:expr) => (
        ::log::error!(
            target: $ctx.name(),
            "[{} {} {}] {}",
            $ctx.time(),
            $crate::colored::Colorize::red("ERROR"),
            $ctx.name(),
            $msg
        )
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        ::log::error!(
            target: $ctx.name(),
            concat!("[{} {} {}] ", $format),
            $ctx.time(),
            $crate::colored::Colorize::red("ERROR"),
            $ctx.name(),
            $($arg)+
        )
    );
}
