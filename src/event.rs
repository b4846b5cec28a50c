//! Error-tracking event model.
//!
//! Events are `sentry` protocol events; this module only owns the level
//! translation and the capped thread snapshot attached to error events.

use crate::record::Level;
use sentry::integrations::backtrace::current_thread;
use sentry::protocol::Thread;

pub use sentry::Level as RemoteLevel;

/// Event submitted to the error-tracking service.
pub type RemoteEvent = sentry::protocol::Event<'static>;

/// Upper bound on frames captured for an error-level event.
pub const MAX_STACK_FRAMES: usize = 64;

/// Translate a local level onto the service's severity scale.
pub fn remote_level(level: Level) -> RemoteLevel {
    match level {
        Level::Debug => RemoteLevel::Debug,
        Level::Info => RemoteLevel::Info,
        Level::Warn => RemoteLevel::Warning,
        Level::Error | Level::Fatal => RemoteLevel::Error,
    }
}

/// Translate a level name, including aliases used by other loggers.
///
/// Unknown names map to `Info` rather than failing.
pub fn remote_level_from_name(name: &str) -> RemoteLevel {
    match name.trim().to_ascii_lowercase().as_str() {
        "debug" | "trace" => RemoteLevel::Debug,
        "info" => RemoteLevel::Info,
        "warn" | "warning" => RemoteLevel::Warning,
        "error" | "err" | "dpanic" | "panic" | "fatal" | "critical" => RemoteLevel::Error,
        _ => RemoteLevel::Info,
    }
}

/// Snapshot of the calling thread, keeping the `max_frames` innermost
/// frames.
///
/// Best-effort: if the stack walk panics the thread is reported without a
/// stacktrace.
pub fn thread_snapshot(max_frames: usize) -> Thread {
    let mut thread = std::panic::catch_unwind(|| current_thread(true)).unwrap_or_else(|_| Thread {
        current: true,
        ..Default::default()
    });

    // Frames run oldest call first, so the innermost ones are at the end.
    if let Some(trace) = thread.stacktrace.as_mut() {
        let excess = trace.frames.len().saturating_sub(max_frames);
        trace.frames.drain(..excess);
    }
    thread.crashed = false;
    thread
}
