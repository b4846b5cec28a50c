//! Environment variable names read by [`PipelineConfig::from_env`].
//!
//! These are purely helpers; the sinks themselves never touch the
//! environment.
//!
//! [`PipelineConfig::from_env`]: crate::config::PipelineConfig::from_env

/// Logical service name embedded in remote event messages.
pub const LOGTEE_SERVICE_NAME_ENV: &str = "LOGTEE_SERVICE_NAME";

/// `true`/`1` enables development mode.
pub const LOGTEE_DEV_MODE_ENV: &str = "LOGTEE_DEV_MODE";

/// Error-tracking DSN; the remote sink is only built when this is set.
pub const LOGTEE_DSN_ENV: &str = "LOGTEE_DSN";

/// Minimum level of the console sink, e.g. `info`.
pub const LOGTEE_CONSOLE_LEVEL_ENV: &str = "LOGTEE_CONSOLE_LEVEL";

/// Minimum level of the remote sink, e.g. `warn`.
pub const LOGTEE_REMOTE_LEVEL_ENV: &str = "LOGTEE_REMOTE_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag; `1`, `true`, `yes` and `on` count as set.
pub fn env_flag(key: &str) -> bool {
    matches!(
        env_or(key, "").trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
