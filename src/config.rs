use crate::env::{
    env_flag, env_or, LOGTEE_CONSOLE_LEVEL_ENV, LOGTEE_DEV_MODE_ENV, LOGTEE_DSN_ENV,
    LOGTEE_REMOTE_LEVEL_ENV, LOGTEE_SERVICE_NAME_ENV,
};
use crate::record::Level;
use crate::remote::RemoteSinkConfig;
use crate::sink::SinkConfig;

/// Remote sink settings: where to send events and how to queue them.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub dsn: String,
    pub sink: RemoteSinkConfig,
}

impl RemoteConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        RemoteConfig {
            dsn: dsn.into(),
            sink: RemoteSinkConfig::default(),
        }
    }
}

/// Full pipeline configuration.
///
/// **Fields**
/// - `service_name`: embedded in every remote event message.
/// - `dev_mode`: text console output, no latency/ip/user agent fields.
///   Always off when `remote` is set.
/// - `console`: gate of the console sink.
/// - `remote`: optional error-tracking sink.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub service_name: String,
    pub dev_mode: bool,
    pub console: SinkConfig,
    pub remote: Option<RemoteConfig>,
}

impl PipelineConfig {
    /// Console-only configuration. Development mode logs from `debug`,
    /// production from `info`.
    pub fn console(service_name: impl Into<String>, dev_mode: bool) -> Self {
        let min_level = if dev_mode { Level::Debug } else { Level::Info };
        PipelineConfig {
            service_name: service_name.into(),
            dev_mode,
            console: SinkConfig::new(min_level),
            remote: None,
        }
    }

    /// Console plus remote sink; development mode is forced off.
    pub fn with_remote(service_name: impl Into<String>, dsn: impl Into<String>) -> Self {
        PipelineConfig {
            remote: Some(RemoteConfig::new(dsn)),
            ..PipelineConfig::console(service_name, false)
        }
    }

    /// Build a configuration from `LOGTEE_*` environment variables.
    ///
    /// Unparseable levels fall back to the defaults instead of failing.
    pub fn from_env() -> Self {
        let service_name = env_or(LOGTEE_SERVICE_NAME_ENV, "unknown-service");
        let dsn = env_or(LOGTEE_DSN_ENV, "");

        let mut config = if dsn.trim().is_empty() {
            PipelineConfig::console(service_name, env_flag(LOGTEE_DEV_MODE_ENV))
        } else {
            PipelineConfig::with_remote(service_name, dsn)
        };

        if let Ok(level) = env_or(LOGTEE_CONSOLE_LEVEL_ENV, "").parse::<Level>() {
            config.console.min_level = level;
        }
        if let Some(remote) = config.remote.as_mut() {
            if let Ok(level) = env_or(LOGTEE_REMOTE_LEVEL_ENV, "").parse::<Level>() {
                remote.sink.min_level = level;
            }
        }
        config
    }
}
