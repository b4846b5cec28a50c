use std::sync::Arc;

use async_trait::async_trait;
use logtee::identity::ServiceIdentity;
use logtee::sink::LogSink;
use logtee::tee::Tee;
use logtee::{Field, Level, LogEntry, Logger, SinkError};

/// Example of plugging a completely custom backend into the tee by
/// implementing `LogSink` directly. Imagine this writes to an audit store
/// this crate knows nothing about.
struct AuditSink;

#[async_trait]
impl LogSink for AuditSink {
    fn name(&self) -> &str {
        "audit"
    }

    fn enabled(&self, level: Level) -> bool {
        level >= Level::Warn
    }

    fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        // Here you would call your own client library.
        println!("[audit] {} {} {:?}", entry.level, entry.message, entry.fields);
        Ok(())
    }

    fn with_fields(self: Arc<Self>, _fields: &[Field]) -> Arc<dyn LogSink> {
        self
    }
}

fn main() {
    let console = logtee::init("audit-demo", true);
    let logger = Logger::new(
        Tee::new(vec![console.tee().sinks()[0].clone(), Arc::new(AuditSink)]),
        ServiceIdentity::new("audit-demo", true),
    );

    logger.info("custom backend example started", vec![]);
    logger.warn("role changed", vec![Field::str("user", "alice"), Field::str("role", "admin")]);
}
