use crate::config::PipelineConfig;
use crate::console::ConsoleSink;
use crate::error::InitError;
use crate::identity::ServiceIdentity;
use crate::layer::TeeLayer;
use crate::logger::Logger;
use crate::remote::RemoteEventSink;
use crate::sink::LogSink;
use crate::tee::Tee;
use crate::transport::{EventTransport, SentryTransport};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// Console-only pipeline writing to stdout.
///
/// **Parameters**
/// - `service_name`: logical name of the process.
/// - `dev_mode`: human-readable output from `debug` and no
///   latency/ip/user agent fields in request logs.
pub fn init(service_name: &str, dev_mode: bool) -> Logger {
    let config = PipelineConfig::console(service_name, dev_mode);
    let identity = ServiceIdentity::new(&config.service_name, config.dev_mode);
    let console: Arc<dyn LogSink> = Arc::new(ConsoleSink::stdout(&identity, config.console));
    Logger::new(Tee::new(vec![console]), identity)
}

/// Console plus error-tracking pipeline. Development mode is forced off.
///
/// **Returns**
/// - `Err(InitError::InvalidDsn)` for a malformed DSN.
/// - `Err(InitError::NoRuntime)` when called outside a Tokio runtime.
///
/// Callers are expected to treat any error as fatal.
pub fn init_with_remote(service_name: &str, dsn: &str) -> Result<Logger, InitError> {
    init_with_config(PipelineConfig::with_remote(service_name, dsn))
}

/// Build the pipeline described by `config`, using [`SentryTransport`] for
/// the remote sink.
pub fn init_with_config(config: PipelineConfig) -> Result<Logger, InitError> {
    let transport = match &config.remote {
        Some(remote) => Some(Arc::new(SentryTransport::from_dsn(&remote.dsn)?) as Arc<dyn EventTransport>),
        None => None,
    };
    init_with_transport(config, transport)
}

/// Build the pipeline with a caller-provided remote transport.
///
/// `transport` is only used when `config.remote` is set.
pub fn init_with_transport(
    config: PipelineConfig,
    transport: Option<Arc<dyn EventTransport>>,
) -> Result<Logger, InitError> {
    let dev_mode = config.dev_mode && config.remote.is_none();
    let identity = ServiceIdentity::new(&config.service_name, dev_mode);

    let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();
    if config.console.enabled {
        sinks.push(Arc::new(ConsoleSink::stdout(&identity, config.console)));
    }

    if let (Some(remote), Some(transport)) = (config.remote, transport) {
        // The worker lives as long as the sink's sender; the handle is not needed.
        let (sink, _handle) = RemoteEventSink::new(transport, Arc::clone(&identity), remote.sink)?;
        sinks.push(Arc::new(sink));
    }

    Ok(Logger::new(Tee::new(sinks), identity))
}

/// Make `logger` the process-wide handle returned by [`global`].
///
/// Single assignment: a second call fails with
/// [`InitError::AlreadyInitialized`].
pub fn install_global(logger: Logger) -> Result<(), InitError> {
    GLOBAL.set(logger).map_err(|_| InitError::AlreadyInitialized)
}

/// Process-wide handle.
///
/// Before [`install_global`] this is a no-op logger: entries are dropped
/// rather than panicking.
pub fn global() -> Logger {
    GLOBAL.get().cloned().unwrap_or_else(Logger::noop)
}

/// Route `tracing` events into `logger` by installing a global subscriber.
pub fn install_tracing(logger: Logger) -> Result<(), InitError> {
    let subscriber = Registry::default().with(TeeLayer::new(logger));
    tracing::subscriber::set_global_default(subscriber).map_err(|e| InitError::Subscriber(e.to_string()))
}
