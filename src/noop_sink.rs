use crate::error::SinkError;
use crate::record::{Field, Level, LogEntry};
use crate::sink::LogSink;
use async_trait::async_trait;
use std::sync::Arc;

/// A sink that accepts every level and drops every entry.
///
/// Useful for measuring the overhead of the dispatcher itself without any
/// I/O, and for tests that don't care about output.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn write(&self, _entry: &LogEntry) -> Result<(), SinkError> {
        Ok(())
    }

    fn with_fields(self: Arc<Self>, _fields: &[Field]) -> Arc<dyn LogSink> {
        self
    }
}
