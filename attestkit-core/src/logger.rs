//! Bridges the `log` facade to a logger supplied by the host app.
//!
//! Records from this crate are forwarded at every level. Records from
//! dependencies (`reqwest`, `hyper`, ...) are forwarded from `Info` up only, so
//! the host is not flooded by transport chatter.
//!
//! Key ids and challenges are never logged in full; call sites log
//! [`fingerprint`]s instead.

use std::sync::{Arc, OnceLock};

const CRATE_MODULE_PREFIX: &str = "attestkit";

/// Receives log messages emitted by the attestation client.
///
/// Implemented by the host app and registered once via [`set_logger`].
///
/// ## Swift
///
/// ```swift
/// final class AttestKitLoggerBridge: AttestKit.Logger {
///     func log(level: AttestKit.LogLevel, message: String) {
///         os_log("%{public}@", message)
///     }
/// }
///
/// AttestKit.setLogger(logger: AttestKitLoggerBridge())
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of attestation and assertion flows.
    Info,
    /// Recoverable problems, e.g. an unreadable stored key id.
    Warn,
    /// Failures surfaced to the caller.
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

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Drops `Debug`/`Trace` records that do not originate from this crate.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let from_crate = module_path.is_some_and(|path| path.starts_with(CRATE_MODULE_PREFIX));
    from_crate || level <= log::Level::Info
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Registers the host logger. Only the first call has an effect.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        log::warn!("logger already set; ignoring");
        return;
    }

    static LOGGER: ForeignLogger = ForeignLogger;
    if let Err(e) = log::set_logger(&LOGGER) {
        // Another `log` backend was installed first (e.g. by the host's own Rust code).
        eprintln!("failed to install attestkit logger: {e}");
        return;
    }
    log::set_max_level(log::LevelFilter::Trace);
}

/// Short, non-reversible identifier for a key id or challenge, safe to log.
pub(crate) fn fingerprint(value: &str) -> String {
    const VISIBLE: usize = 6;
    let prefix: String = value.chars().take(VISIBLE).collect();
    if prefix.len() == value.len() {
        format!("{prefix} ({} chars)", value.len())
    } else {
        format!("{prefix}… ({} chars)", value.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct CapturingLogger {
        records: Mutex<Vec<(LogLevel, String)>>,
    }

    impl Logger for CapturingLogger {
        fn log(&self, level: LogLevel, message: String) {
            self.records.lock().unwrap().push((level, message));
        }
    }

    #[test]
    fn test_filter_keeps_crate_debug_and_drops_dependency_debug() {
        assert!(should_forward(log::Level::Debug, Some("attestkit_core::client")));
        assert!(should_forward(log::Level::Trace, Some("attestkit_core")));
        assert!(!should_forward(log::Level::Debug, Some("hyper::proto")));
        assert!(!should_forward(log::Level::Trace, None));
        assert!(should_forward(log::Level::Info, Some("reqwest::connect")));
        assert!(should_forward(log::Level::Error, None));
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warn);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Trace);
    }

    #[test]
    fn test_fingerprint_truncates() {
        assert_eq!(fingerprint("abcdefghij"), "abcdef… (10 chars)");
        assert_eq!(fingerprint("abc"), "abc (3 chars)");
        assert_eq!(fingerprint(""), " (0 chars)");
    }

    #[test]
    fn test_set_logger_forwards_crate_records() {
        let logger = Arc::new(CapturingLogger {
            records: Mutex::new(Vec::new()),
        });
        set_logger(logger.clone());

        log::info!(target: "attestkit_core::tests", "hello from the client");

        let records = logger.records.lock().unwrap();
        assert!(records
            .iter()
            .any(|(level, message)| *level == LogLevel::Info && message == "hello from the client"));
    }
}
