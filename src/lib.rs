pub mod record;
pub mod error;
pub mod identity;
pub mod sink;
pub mod console;
pub mod event;
pub mod transport;
pub mod remote;
pub mod tee;
pub mod logger;
pub mod layer;
pub mod middleware;

#[cfg(feature = "axum")]
pub mod axum_middleware;

pub mod config;
pub mod env;
pub mod init;
pub mod noop_sink;

pub use error::{DispatchError, InitError, SinkError};
pub use init::{global, init, init_with_config, init_with_remote, install_global, install_tracing};
pub use logger::Logger;
pub use record::{Field, FieldValue, Level, LogEntry};
