use std::fmt;
use std::time::Duration;

/// Fatal errors raised while building the pipeline.
///
/// These are meant to stop the process: serving traffic without a working
/// logger is not supported.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid remote DSN: {0}")]
    InvalidDsn(#[from] sentry::types::ParseDsnError),

    #[error("failed to build remote transport: {0}")]
    Transport(String),

    #[error("remote sink requires a running Tokio runtime")]
    NoRuntime,

    #[error("logger already initialized")]
    AlreadyInitialized,

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Non-fatal failure of a single sink.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink `{sink}` failed to write entry: {reason}")]
    Write { sink: String, reason: String },

    #[error("sink `{sink}` is closed")]
    Closed { sink: String },

    #[error("sink `{sink}` did not flush within {timeout:?}")]
    FlushTimeout { sink: String, timeout: Duration },

    #[error("sink `{sink}` failed to flush: {reason}")]
    Flush { sink: String, reason: String },

    #[error("sink `{sink}` panicked while writing")]
    Panicked { sink: String },
}

impl SinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SinkError::FlushTimeout { .. })
    }
}

/// Aggregate of every sink failure observed during one dispatcher call.
#[derive(Debug)]
pub struct DispatchError {
    pub failures: Vec<SinkError>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sink(s) failed", self.failures.len())?;
        for (i, e) in self.failures.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for DispatchError {}
