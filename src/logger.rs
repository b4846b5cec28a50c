use crate::error::DispatchError;
use crate::identity::ServiceIdentity;
use crate::noop_sink::NoopSink;
use crate::record::{Caller, Field, Level, LogEntry};
use crate::tee::Tee;
use std::sync::Arc;
use std::time::Duration;

/// Bound applied by [`Logger::sync`].
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle through which application code and middleware emit entries.
///
/// Cheap to clone; every clone shares the same sinks and identity. Pass it
/// explicitly to the components that log (see [`crate::init`] for the
/// optional process-wide handle).
#[derive(Clone)]
pub struct Logger {
    tee: Arc<Tee>,
    identity: Arc<ServiceIdentity>,
}

impl Logger {
    pub fn new(tee: Tee, identity: Arc<ServiceIdentity>) -> Self {
        Logger { tee: Arc::new(tee), identity }
    }

    /// Logger backed by a [`NoopSink`]. Every call is accepted and discarded.
    pub fn noop() -> Self {
        Logger::new(Tee::new(vec![Arc::new(NoopSink)]), ServiceIdentity::new("", false))
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn dev_mode(&self) -> bool {
        self.identity.dev_mode()
    }

    pub fn tee(&self) -> &Tee {
        &self.tee
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.tee.enabled(level)
    }

    /// Build an entry at `level`, stamped with the caller's location, and
    /// dispatch it.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, fields: Vec<Field>) {
        if !self.enabled(level) {
            return;
        }
        let entry = LogEntry::new(level, message, fields).with_caller(Caller::here());
        self.log_entry(&entry);
    }

    /// Dispatch a prebuilt entry. Sink failures are reported on stderr and
    /// never returned.
    pub fn log_entry(&self, entry: &LogEntry) {
        if let Err(e) = self.tee.write(entry) {
            eprintln!("log dispatch failed: {}", e);
        }
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, fields: Vec<Field>) {
        self.log(Level::Debug, message, fields);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, fields: Vec<Field>) {
        self.log(Level::Info, message, fields);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>, fields: Vec<Field>) {
        self.log(Level::Warn, message, fields);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, fields: Vec<Field>) {
        self.log(Level::Error, message, fields);
    }

    /// Log at `Fatal`. The process is not terminated.
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>, fields: Vec<Field>) {
        self.log(Level::Fatal, message, fields);
    }

    /// Derive a logger whose sinks attach `fields` to every entry.
    pub fn with_fields(&self, fields: &[Field]) -> Logger {
        Logger {
            tee: Arc::new(self.tee.with_fields(fields)),
            identity: Arc::clone(&self.identity),
        }
    }

    /// Flush every sink, each bounded by `timeout`.
    pub async fn flush(&self, timeout: Duration) -> Result<(), DispatchError> {
        self.tee.flush(timeout).await
    }

    /// Flush with [`DEFAULT_FLUSH_TIMEOUT`]. Intended for shutdown.
    pub async fn sync(&self) -> Result<(), DispatchError> {
        self.flush(DEFAULT_FLUSH_TIMEOUT).await
    }
}
