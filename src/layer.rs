use crate::logger::Logger;
use crate::record::{Caller, Field, FieldValue, Level, LogEntry};
use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that converts events into [`LogEntry`]s and
/// hands them to a [`Logger`].
///
/// Lets code that already uses `tracing::info!` and friends share the same
/// sinks as the request middleware. Field types are preserved, so string
/// fields still become remote tags.
pub struct TeeLayer {
    logger: Logger,
}

impl TeeLayer {
    pub fn new(logger: Logger) -> Self {
        TeeLayer { logger }
    }
}

impl<S> Layer<S> for TeeLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(meta.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut fields = Vec::new();
        let mut message = None;
        event.record(&mut FieldVisitor { fields: &mut fields, message: &mut message });

        let mut entry = LogEntry::new(level, message.unwrap_or_default(), fields);
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            entry = entry.with_caller(Caller::new(file, line));
        }
        self.logger.log_entry(&entry);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<Field>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &TracingField, value: FieldValue) {
        self.fields.push(Field::new(field.name(), value));
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.push(field, FieldValue::Str(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, FieldValue::Int(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, FieldValue::Uint(value));
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, FieldValue::Float(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, FieldValue::Bool(value));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.push(field, FieldValue::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, FieldValue::Str(format!("{:?}", value)));
        }
    }
}
