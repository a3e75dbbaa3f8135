//! # Rotalog
//!
//! A leveled logger for long-running processes, with hourly file rotation and
//! bounded retention.
//!
//! ## Features
//!
//! - **Five severities**: `DEBUG < INFO < WARN < ERROR < FATAL`, filtered against
//!   a runtime-adjustable threshold before any formatting work is done
//! - **Console colors**: ANSI-decorated level tags when writing to a terminal
//! - **Hourly rotation**: output files are named `<name>_YYYYMMDD_HH.log` and
//!   rotated lazily on the first write after the hour has elapsed
//! - **Retention**: superseded files are gzipped in the background and removed
//!   once older than the retention horizon
//! - **Never fails the host**: I/O faults degrade to dropped lines, not panics
//!
//! ## Quick Start
//!
//! ```no_run
//! use rotalog::{Logger, LoggerConfig, Severity};
//!
//! let logger = Logger::new(LoggerConfig::default());
//! logger.set_level(Severity::Info);
//! logger.set_output_file("/var/log/myapp", "app.log");
//!
//! rotalog::info!(logger: &logger, "service started", 8080, "prod");
//! rotalog::debug!(logger: &logger, "suppressed at INFO");
//! ```

pub mod clock;
pub mod config;
pub mod filters;
pub mod format;
pub mod level;
pub mod logger;
pub mod message;
pub mod retention;
pub mod rotation;
pub mod sink;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LoggerConfig, RetentionConfig};
pub use level::Severity;
pub use logger::{CallSite, LevelLogger, Logger, LoggerGuard, LoggerStats};
pub use sink::{FileSink, SharedSink, SinkGuard};

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Logger-specific errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Log rotation error: {message}")]
    Rotation { message: String },

    #[error("Retention policy error: {message}")]
    Retention { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Logger system error: {message}")]
    System { message: String },
}

/// Log a message at `DEBUG`.
///
/// `debug!("message", arg1, arg2)` goes through [`Logger::global`];
/// `debug!(logger: &my_logger, "message", args...)` uses an explicit logger.
/// Arguments may be any [`serde::Serialize`] value.
#[macro_export]
macro_rules! debug {
    (logger: $logger:expr, $msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($logger, $crate::Severity::Debug, $msg $(, $arg)*)
    };
    ($msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($crate::Logger::global(), $crate::Severity::Debug, $msg $(, $arg)*)
    };
}

/// Log a message at `INFO`. See [`debug!`] for the accepted forms.
#[macro_export]
macro_rules! info {
    (logger: $logger:expr, $msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($logger, $crate::Severity::Info, $msg $(, $arg)*)
    };
    ($msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($crate::Logger::global(), $crate::Severity::Info, $msg $(, $arg)*)
    };
}

/// Log a message at `WARN`. See [`debug!`] for the accepted forms.
#[macro_export]
macro_rules! warn {
    (logger: $logger:expr, $msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($logger, $crate::Severity::Warn, $msg $(, $arg)*)
    };
    ($msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($crate::Logger::global(), $crate::Severity::Warn, $msg $(, $arg)*)
    };
}

/// Log a message at `ERROR`. See [`debug!`] for the accepted forms.
#[macro_export]
macro_rules! error {
    (logger: $logger:expr, $msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($logger, $crate::Severity::Error, $msg $(, $arg)*)
    };
    ($msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($crate::Logger::global(), $crate::Severity::Error, $msg $(, $arg)*)
    };
}

/// Log a message at `FATAL`. The process is not terminated.
#[macro_export]
macro_rules! fatal {
    (logger: $logger:expr, $msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($logger, $crate::Severity::Fatal, $msg $(, $arg)*)
    };
    ($msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::__log!($crate::Logger::global(), $crate::Severity::Fatal, $msg $(, $arg)*)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($logger:expr, $level:expr, $msg:expr $(, $arg:expr)*) => {{
        use $crate::LevelLogger as _;
        let logger = $logger;
        let level = $level;
        if logger.enabled(level) {
            let args: ::std::vec::Vec<::std::option::Option<::std::string::String>> =
                ::std::vec![$($crate::message::render_arg(&$arg)),*];
            logger.log(
                level,
                ::std::option::Option::Some($crate::CallSite::new(file!(), line!())),
                &$crate::message::compose($msg, args),
            );
        }
    }};
}
