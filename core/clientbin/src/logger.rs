//! Pluggable logging facade.
//!
//! The library never requires a logger. Every [`Logger`] method defaults to a
//! no-op, so an implementation may override only the severities it cares about.
//!
//! ## Implementations
//!
//! - [`NoopLogger`] discards everything and is the default.
//! - [`TracingLogger`] forwards to `tracing` under the `clientbin` target.

use std::fmt;

/// Receives diagnostic messages from discovery and provisioning.
pub trait Logger: Send + Sync {
    /// Verbose diagnostics.
    fn debug(&self, _message: fmt::Arguments<'_>) {}

    /// Progress of normal operation.
    fn info(&self, _message: fmt::Arguments<'_>) {}

    /// Recoverable problems.
    fn warn(&self, _message: fmt::Arguments<'_>) {}

    /// Failures.
    fn error(&self, _message: fmt::Arguments<'_>) {}
}

/// Logger that discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {}

/// Logger forwarding to the `tracing` ecosystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: fmt::Arguments<'_>) {
        tracing::debug!(target: "clientbin", "{message}");
    }

    fn info(&self, message: fmt::Arguments<'_>) {
        tracing::info!(target: "clientbin", "{message}");
    }

    fn warn(&self, message: fmt::Arguments<'_>) {
        tracing::warn!(target: "clientbin", "{message}");
    }

    fn error(&self, message: fmt::Arguments<'_>) {
        tracing::error!(target: "clientbin", "{message}");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records `info` messages only; other severities use the defaults.
    #[derive(Default)]
    pub(crate) struct InfoRecorder {
        pub(crate) lines: Mutex<Vec<String>>,
    }

    impl Logger for InfoRecorder {
        fn info(&self, message: fmt::Arguments<'_>) {
            self.lines
                .lock()
                .expect("Should lock recorder")
                .push(message.to_string());
        }
    }

    #[test]
    fn partial_logger_receives_overridden_severity() {
        let logger = InfoRecorder::default();
        logger.info(format_args!("test {}", "logging"));
        logger.debug(format_args!("ignored"));
        logger.error(format_args!("ignored"));

        let lines = logger.lines.lock().expect("Should lock recorder");
        assert_eq!(lines.as_slice(), ["test logging"]);
    }

    #[test]
    fn noop_logger_accepts_every_severity() {
        let logger = NoopLogger;
        logger.debug(format_args!("a"));
        logger.info(format_args!("b"));
        logger.warn(format_args!("c"));
        logger.error(format_args!("d"));
    }
}
