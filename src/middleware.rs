//! Per-request instrumentation shared by every framework binding.
//!
//! A binding only has to expose the facts of a finished request through
//! [`RequestFacts`]; classification and field building live here.

use crate::logger::Logger;
use crate::record::{Caller, Field, Level, LogEntry};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, Instant};

/// Value of the `body` field when the framework does not expose the
/// response body.
pub const BODY_NOT_CAPTURED: &str = "(response body not captured)";

/// What the middleware needs to know about a completed request.
pub trait RequestFacts {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    fn status(&self) -> u16;
    fn latency(&self) -> Duration;
    fn client_ip(&self) -> &str;
    fn user_agent(&self) -> &str;
    /// Error messages accumulated while handling the request.
    fn errors(&self) -> &[String];
    /// Response body, if the framework captured it.
    fn response_body(&self) -> Option<&str>;
}

/// Plain-data [`RequestFacts`] implementation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
    pub errors: Vec<String>,
    pub body: Option<String>,
}

impl RequestFacts for RequestContext {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn latency(&self) -> Duration {
        (self.end - self.start).to_std().unwrap_or_default()
    }

    fn client_ip(&self) -> &str {
        &self.client_ip
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn response_body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Level for a status code and whether the body should be captured.
pub fn classify(status: u16) -> (Level, bool) {
    match status {
        500..=u16::MAX => (Level::Error, true),
        400..=499 => (Level::Warn, true),
        _ => (Level::Info, false),
    }
}

/// Reason phrase used as the entry message, e.g. `"OK"` for 200.
pub fn status_text(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status")
}

/// Render a latency the way humans read it: `12ms`, `1.5s`, `1m30s`.
///
/// Below one second the largest fitting unit is used; from one second on
/// the value is split into hours, minutes and seconds. Precision is kept
/// down to the nanosecond.
pub fn format_latency(latency: Duration) -> String {
    let nanos = latency.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000));
    }

    let secs = latency.as_secs();
    let (hours, minutes) = (secs / 3600, secs / 60 % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    let rest = u128::from(secs % 60) * 1_000_000_000 + u128::from(latency.subsec_nanos());
    out.push_str(&format!("{}s", decimal(rest, 1_000_000_000)));
    out
}

/// `value / unit` with the fraction written out and trailing zeros removed.
fn decimal(value: u128, unit: u128) -> String {
    let (whole, frac) = (value / unit, value % unit);
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Build the single entry describing a finished request.
///
/// `caller` identifies the binding that observed the request and ends up
/// in the `caller` field.
pub fn request_entry(facts: &impl RequestFacts, caller: &str, dev_mode: bool) -> LogEntry {
    let status = facts.status();
    let (level, capture_body) = classify(status);

    let mut fields = vec![
        Field::str("method", facts.method()),
        Field::str("path", facts.path()),
        Field::uint("status", status as u64),
        Field::str("caller", caller),
    ];

    if !dev_mode {
        fields.push(Field::str("latency", format_latency(facts.latency())));
        fields.push(Field::str("ip", facts.client_ip()));
        fields.push(Field::str("user_agent", facts.user_agent()));
    }

    let errors = facts.errors();
    if !errors.is_empty() {
        fields.push(Field::str("error", errors.join("; ")));
    }

    if capture_body {
        fields.push(Field::str("body", facts.response_body().unwrap_or(BODY_NOT_CAPTURED)));
    }

    LogEntry::new(level, status_text(status), fields)
}

/// Emit the request entry through `logger`.
#[track_caller]
pub fn emit_request(logger: &Logger, facts: &impl RequestFacts, caller: &str) {
    let entry = request_entry(facts, caller, logger.dev_mode()).with_caller(Caller::here());
    logger.log_entry(&entry);
}

/// Outcome of the downstream handler as seen by [`instrument`].
pub trait Outcome {
    fn status(&self) -> u16;
    /// Downstream error message, if the handler failed.
    fn error_message(&self) -> Option<String>;
    fn response_body(&self) -> Option<String> {
        None
    }
}

/// A failed handler counts as a 500 carrying the error's message.
impl<T, E> Outcome for Result<T, E>
where
    T: Outcome,
    E: std::fmt::Display,
{
    fn status(&self) -> u16 {
        match self {
            Ok(reply) => reply.status(),
            Err(_) => 500,
        }
    }

    fn error_message(&self) -> Option<String> {
        match self {
            Ok(reply) => reply.error_message(),
            Err(e) => Some(e.to_string()),
        }
    }

    fn response_body(&self) -> Option<String> {
        self.as_ref().ok().and_then(|reply| reply.response_body())
    }
}

/// Facts known before the downstream handler runs.
#[derive(Debug, Clone, Default)]
pub struct RequestStart {
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub user_agent: String,
}

struct Finished<'a> {
    start: &'a RequestStart,
    status: u16,
    latency: Duration,
    errors: Vec<String>,
    body: Option<String>,
}

impl RequestFacts for Finished<'_> {
    fn method(&self) -> &str {
        &self.start.method
    }

    fn path(&self) -> &str {
        &self.start.path
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn latency(&self) -> Duration {
        self.latency
    }

    fn client_ip(&self) -> &str {
        &self.start.client_ip
    }

    fn user_agent(&self) -> &str {
        &self.start.user_agent
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn response_body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Run `next`, then log exactly one entry describing the request.
///
/// The downstream result is returned untouched; logging cannot change it.
#[track_caller]
pub fn instrument<'a, F, O>(
    logger: &'a Logger,
    caller: &'a str,
    start: RequestStart,
    next: F,
) -> impl Future<Output = O> + 'a
where
    F: Future<Output = O> + 'a,
    O: Outcome + 'a,
{
    let location = Caller::here();
    async move {
        let began = Instant::now();
        let outcome = next.await;

        let finished = Finished {
            start: &start,
            status: outcome.status(),
            latency: began.elapsed(),
            errors: outcome.error_message().into_iter().collect(),
            body: outcome.response_body(),
        };
        let entry = request_entry(&finished, caller, logger.dev_mode()).with_caller(location);
        logger.log_entry(&entry);

        outcome
    }
}
