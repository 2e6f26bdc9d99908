//! Forwarding of `log` records to a host-provided logger.

use std::sync::{Arc, OnceLock};

/// Sink for CredKit log messages, implemented by the host application.
///
/// Messages never contain passwords. Usernames and service names may appear
/// at debug level.
///
/// # Examples
///
/// ```rust
/// use credkit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Kotlin
///
/// ```kotlin
/// object CredKitLogBridge : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Log.println(level.toPriority(), "CredKit", message)
///     }
/// }
///
/// setLogger(CredKitLogBridge) // once, at startup
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Receives one formatted record.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// State-machine transitions.
    Debug,
    /// Notable events.
    Info,
    /// Recovered anomalies, such as replacing a gated entry.
    Warn,
    /// Failures.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// Whether a record should reach the host logger.
///
/// Debug and trace records are only kept when they come from CredKit itself.
fn is_forwarded(level: log::Level, module_path: Option<&str>) -> bool {
    let from_credkit = module_path.is_some_and(|path| path.starts_with("credkit"));
    level <= log::Level::Info || from_credkit
}

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !is_forwarded(record.level(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        } else {
            eprintln!("credkit logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs the host logger and routes the `log` facade to it.
///
/// Only the first call has an effect; later calls are reported on stderr and
/// ignored.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    static LOGGER: ForeignLogger = ForeignLogger;

    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("credkit logger already set");
        return;
    }
    if let Err(e) = log::set_logger(&LOGGER) {
        eprintln!("failed to install credkit logger: {e}");
        return;
    }
    log::set_max_level(log::LevelFilter::Trace);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_debug_records_are_dropped() {
        assert!(!is_forwarded(log::Level::Debug, Some("hyper::client")));
        assert!(!is_forwarded(log::Level::Trace, None));
        assert!(is_forwarded(log::Level::Debug, Some("credkit_core::store")));
        assert!(is_forwarded(log::Level::Warn, Some("hyper::client")));
        assert!(is_forwarded(log::Level::Info, None));
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warn);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Trace);
    }
}
