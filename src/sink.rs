use crate::error::SinkError;
use crate::record::{Field, Level, LogEntry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Destination for [`LogEntry`]s offered by the [`Tee`](crate::tee::Tee).
///
/// Implementations are responsible for projecting entries onto a concrete
/// backend (stdout, an error-tracking service, etc). `write` is called on
/// the request path and must never wait on network I/O; sinks that talk to
/// the network hand the work to their own background task.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Short, stable name used in error reports.
    fn name(&self) -> &str;

    /// Whether an entry at `level` would be accepted. Pure.
    fn enabled(&self, level: Level) -> bool;

    /// Accept a single entry.
    ///
    /// **Returns**
    /// - `Ok(())` if the entry was persisted or handed off.
    /// - `Err(..)` if the sink could not take it. The dispatcher collects
    ///   the error and keeps offering the entry to the remaining sinks.
    fn write(&self, entry: &LogEntry) -> Result<(), SinkError>;

    /// Drain buffered or in-flight work, waiting at most `timeout`.
    ///
    /// A [`SinkError::FlushTimeout`] is informational: the caller (usually
    /// shutdown code) decides whether to care.
    async fn flush(&self, _timeout: Duration) -> Result<(), SinkError> {
        Ok(())
    }

    /// Derive a sink that attaches `fields` to every subsequent write.
    fn with_fields(self: Arc<Self>, fields: &[Field]) -> Arc<dyn LogSink>;
}

/// Per-sink gating configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub min_level: Level,
    pub enabled: bool,
}

impl SinkConfig {
    pub fn new(min_level: Level) -> Self {
        SinkConfig { min_level, enabled: true }
    }

    pub fn disabled() -> Self {
        SinkConfig { min_level: Level::Fatal, enabled: false }
    }

    pub fn accepts(&self, level: Level) -> bool {
        self.enabled && level >= self.min_level
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::new(Level::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_gates_by_minimum_level() {
        let cfg = SinkConfig::new(Level::Warn);
        assert!(!cfg.accepts(Level::Info));
        assert!(cfg.accepts(Level::Warn));
        assert!(cfg.accepts(Level::Fatal));
    }

    #[test]
    fn disabled_config_accepts_nothing() {
        let cfg = SinkConfig::disabled();
        assert!(!cfg.accepts(Level::Fatal));
    }
}
