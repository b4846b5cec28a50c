use crate::error::SinkError;
use crate::identity::ServiceIdentity;
use crate::record::{Field, Level, LogEntry};
use crate::sink::{LogSink, SinkConfig};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output encoding of [`ConsoleSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFormat {
    /// One JSON object per line, `time` included.
    Json,
    /// Tab-separated `LEVEL caller message {fields}` for local development.
    Text,
}

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Line-oriented sink writing to stdout or any [`Write`] implementation.
///
/// Writes are serialized through the sink's own mutex so concurrent
/// requests never interleave partial lines.
#[derive(Clone)]
pub struct ConsoleSink {
    writer: SharedWriter,
    format: ConsoleFormat,
    config: SinkConfig,
    context: Vec<Field>,
}

impl ConsoleSink {
    /// Stdout sink whose format follows the identity's dev mode.
    pub fn stdout(identity: &ServiceIdentity, config: SinkConfig) -> Self {
        let format = if identity.dev_mode() { ConsoleFormat::Text } else { ConsoleFormat::Json };
        Self::with_writer(Box::new(io::stdout()), format, config)
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, format: ConsoleFormat, config: SinkConfig) -> Self {
        ConsoleSink {
            writer: Arc::new(Mutex::new(writer)),
            format,
            config,
            context: Vec::new(),
        }
    }

    pub fn format(&self) -> ConsoleFormat {
        self.format
    }

    fn encode(&self, entry: &LogEntry) -> Result<String, serde_json::Error> {
        let mut fields = serde_json::Map::new();
        for field in self.context.iter().chain(entry.fields.iter()) {
            fields.insert(field.key.clone(), field.value.to_json());
        }

        match self.format {
            ConsoleFormat::Json => {
                let mut line = serde_json::Map::new();
                line.insert("level".into(), entry.level.as_str().into());
                line.insert("time".into(), entry.timestamp.to_rfc3339().into());
                if let Some(caller) = &entry.caller {
                    line.insert("caller".into(), caller.to_string().into());
                }
                line.insert("msg".into(), entry.message.clone().into());
                // Fields come last so a `caller` field overrides the captured location.
                line.extend(fields);
                let mut out = serde_json::to_string(&serde_json::Value::Object(line))?;
                out.push('\n');
                Ok(out)
            }
            ConsoleFormat::Text => {
                let mut out = entry.level.as_str().to_ascii_uppercase();
                if let Some(caller) = &entry.caller {
                    out.push('\t');
                    out.push_str(&caller.to_string());
                }
                out.push('\t');
                out.push_str(&entry.message);
                if !fields.is_empty() {
                    out.push('\t');
                    out.push_str(&serde_json::to_string(&fields)?);
                }
                out.push('\n');
                Ok(out)
            }
        }
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn enabled(&self, level: Level) -> bool {
        self.config.accepts(level)
    }

    fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let line = self.encode(entry).map_err(|e| SinkError::Write {
            sink: self.name().to_string(),
            reason: e.to_string(),
        })?;

        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        writer.write_all(line.as_bytes()).map_err(|e| SinkError::Write {
            sink: self.name().to_string(),
            reason: e.to_string(),
        })
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        writer.flush().map_err(|e| SinkError::Flush {
            sink: self.name().to_string(),
            reason: e.to_string(),
        })
    }

    fn with_fields(self: Arc<Self>, fields: &[Field]) -> Arc<dyn LogSink> {
        let mut derived = (*self).clone();
        derived.context.extend(fields.iter().cloned());
        Arc::new(derived)
    }
}
