use crate::error::{DispatchError, SinkError};
use crate::record::{Field, Level, LogEntry};
use crate::sink::LogSink;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fan-out over an ordered, fixed set of sinks.
///
/// Every entry is offered to every sink that accepts its level. A sink
/// returning an error or panicking never prevents delivery to the others;
/// failures come back as one [`DispatchError`].
pub struct Tee {
    sinks: Vec<Arc<dyn LogSink>>,
    /// Entries offered to the tee.
    pub written: AtomicU64,
    /// Individual sink failures observed while writing.
    pub failed: AtomicU64,
}

impl Tee {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Tee {
            sinks,
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn sinks(&self) -> &[Arc<dyn LogSink>] {
        &self.sinks
    }

    /// Whether any sink would accept an entry at `level`.
    pub fn enabled(&self, level: Level) -> bool {
        self.sinks.iter().any(|s| s.enabled(level))
    }

    pub fn write(&self, entry: &LogEntry) -> Result<(), DispatchError> {
        self.written.fetch_add(1, Ordering::Relaxed);

        let mut failures = Vec::new();
        for sink in &self.sinks {
            if !sink.enabled(entry.level) {
                continue;
            }
            let res = panic::catch_unwind(AssertUnwindSafe(|| sink.write(entry)));
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(_) => failures.push(SinkError::Panicked {
                    sink: sink.name().to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            self.failed.fetch_add(failures.len() as u64, Ordering::Relaxed);
            Err(DispatchError { failures })
        }
    }

    /// Flush every sink, giving each one up to `timeout`.
    ///
    /// Sinks are flushed in order; total time is bounded by
    /// `timeout * sinks.len()`.
    pub async fn flush(&self, timeout: Duration) -> Result<(), DispatchError> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            match tokio::time::timeout(timeout, sink.flush(timeout)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(_) => failures.push(SinkError::FlushTimeout {
                    sink: sink.name().to_string(),
                    timeout,
                }),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError { failures })
        }
    }

    /// Derive a tee whose sinks attach `fields` to every write.
    pub fn with_fields(&self, fields: &[Field]) -> Tee {
        Tee::new(
            self.sinks
                .iter()
                .map(|s| Arc::clone(s).with_fields(fields))
                .collect(),
        )
    }
}
