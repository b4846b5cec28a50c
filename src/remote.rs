use crate::error::{InitError, SinkError};
use crate::event::{remote_level, thread_snapshot, RemoteEvent, MAX_STACK_FRAMES};
use crate::identity::ServiceIdentity;
use crate::record::{Field, FieldValue, Level, LogEntry};
use crate::sink::{LogSink, SinkConfig};
use crate::transport::EventTransport;
use async_trait::async_trait;
use sentry::protocol::Map;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Value of the `logger` extra attached to every event.
pub const LOGGER_KIND: &str = "logtee";

/// Configuration for [`RemoteEventSink`].
///
/// **Fields**
/// - `min_level`: entries below this level never reach the transport.
/// - `channel_buffer`: events queued before new ones are dropped.
/// - `flush_timeout`: upper bound on a single flush.
/// - `send_timeout`: upper bound on handing one event to the transport.
/// - `max_stack_frames`: cap on the snapshot attached to error events.
#[derive(Clone, Debug)]
pub struct RemoteSinkConfig {
    pub min_level: Level,
    pub channel_buffer: usize,
    pub flush_timeout: Duration,
    pub send_timeout: Duration,
    pub max_stack_frames: usize,
}

impl Default for RemoteSinkConfig {
    fn default() -> Self {
        Self {
            min_level: Level::Warn,
            channel_buffer: 1024,
            flush_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_secs(5),
            max_stack_frames: MAX_STACK_FRAMES,
        }
    }
}

/// Point-in-time copy of the sink's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteStats {
    /// Entries that passed the level gate.
    pub total: u64,
    /// Events handed to the background task.
    pub enqueued: u64,
    /// Events dropped because the queue was full.
    pub dropped: u64,
    /// Events the transport accepted.
    pub sent: u64,
    /// Events the transport rejected.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

enum Command {
    Event(Box<RemoteEvent>),
    Flush {
        timeout: Duration,
        ack: oneshot::Sender<Result<(), String>>,
    },
}

/// Sink that turns warn-and-above entries into error-tracking events.
///
/// `write` only builds the event and queues it; a background Tokio task owns
/// the transport and submits events one by one. Transport failures are
/// counted and reported to stderr, never returned to the writer.
pub struct RemoteEventSink {
    sender: mpsc::Sender<Command>,
    identity: Arc<ServiceIdentity>,
    config: RemoteSinkConfig,
    gate: SinkConfig,
    counters: Arc<Counters>,
}

impl RemoteEventSink {
    /// Create a new sink and spawn the task that drains its queue into
    /// `transport`.
    ///
    /// **Returns**
    /// - the sink and the worker's [`JoinHandle`];
    /// - `Err(InitError::NoRuntime)` when called outside a Tokio runtime.
    pub fn new(
        transport: Arc<dyn EventTransport>,
        identity: Arc<ServiceIdentity>,
        config: RemoteSinkConfig,
    ) -> Result<(Self, JoinHandle<()>), InitError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| InitError::NoRuntime)?;

        let buffer = config.channel_buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<Command>(buffer);
        let counters = Arc::new(Counters::default());
        let counters_bg = Arc::clone(&counters);
        let send_timeout = config.send_timeout;

        // Every transport call is bounded: a stuck call must not stall the
        // events queued behind it.
        let handle = runtime.spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Event(event) => {
                        let res = match tokio::time::timeout(send_timeout, transport.send_event(&event)).await {
                            Ok(res) => res.map_err(|e| e.to_string()),
                            Err(_) => Err(format!("no answer within {:?}", send_timeout)),
                        };
                        match res {
                            Ok(()) => {
                                counters_bg.sent.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                counters_bg.failed.fetch_add(1, Ordering::Relaxed);
                                eprintln!("error submitting remote event {}: {}", event.event_id, e);
                            }
                        }
                    }
                    Command::Flush { timeout, ack } => {
                        let res = match tokio::time::timeout(timeout, transport.flush(timeout)).await {
                            Ok(res) => res.map_err(|e| e.to_string()),
                            Err(_) => Err(format!("transport flush exceeded {:?}", timeout)),
                        };
                        let _ = ack.send(res);
                    }
                }
            }
        });

        let gate = SinkConfig::new(config.min_level);
        Ok((
            Self {
                sender: tx,
                identity,
                config,
                gate,
                counters,
            },
            handle,
        ))
    }

    pub fn stats(&self) -> RemoteStats {
        RemoteStats {
            total: self.counters.total.load(Ordering::Relaxed),
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Map an entry onto a remote event.
    ///
    /// String fields become tags and every other field becomes an extra.
    /// Each call mints a fresh event id, which is also embedded in the
    /// message so identical messages stay distinguishable.
    pub fn to_event(&self, entry: &LogEntry) -> RemoteEvent {
        let mut tags = Map::new();
        let mut extra = Map::new();

        for field in &entry.fields {
            match &field.value {
                FieldValue::Str(s) => {
                    tags.insert(field.key.clone(), s.clone());
                }
                other => {
                    extra.insert(field.key.clone(), other.to_json());
                }
            }
        }

        let event_id = Uuid::new_v4();
        let message = format!("[{}] - {} - {}", event_id, self.identity.service_name(), entry.message);

        extra.insert("logger".to_string(), LOGGER_KIND.into());
        extra.insert("level".to_string(), entry.level.as_str().into());
        extra.insert("time".to_string(), entry.timestamp.to_rfc3339().into());
        extra.insert("pid".to_string(), std::process::id().into());
        if let Some(caller) = &entry.caller {
            extra.insert("caller".to_string(), caller.to_string().into());
        }

        let threads = if entry.level >= Level::Error {
            vec![thread_snapshot(self.config.max_stack_frames)]
        } else {
            Vec::new()
        };

        RemoteEvent {
            event_id,
            message: Some(message),
            level: remote_level(entry.level),
            timestamp: entry.timestamp.into(),
            tags,
            extra,
            threads: threads.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LogSink for RemoteEventSink {
    fn name(&self) -> &str {
        "remote"
    }

    fn enabled(&self, level: Level) -> bool {
        self.gate.accepts(level)
    }

    fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        if !self.enabled(entry.level) {
            return Ok(());
        }
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        let event = self.to_event(entry);
        match self.sender.try_send(Command::Event(Box::new(event))) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                eprintln!("remote event queue full, dropping event");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed {
                sink: self.name().to_string(),
            }),
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<(), SinkError> {
        let timeout = timeout.min(self.config.flush_timeout);
        let closed = || SinkError::Closed { sink: self.name().to_string() };

        let (ack, done) = oneshot::channel();
        let wait = async {
            self.sender
                .send(Command::Flush { timeout, ack })
                .await
                .map_err(|_| closed())?;
            done.await.map_err(|_| closed())
        };

        match tokio::time::timeout(timeout, wait).await {
            Err(_) => Err(SinkError::FlushTimeout {
                sink: self.name().to_string(),
                timeout,
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(Err(reason))) => Err(SinkError::Flush {
                sink: self.name().to_string(),
                reason,
            }),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }

    fn with_fields(self: Arc<Self>, _fields: &[Field]) -> Arc<dyn LogSink> {
        // Context travels with each entry; nothing is accumulated here.
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::event::RemoteLevel;
    use crate::record::Caller;
    use std::error::Error;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Transport that keeps every event it is given.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) events: Mutex<Vec<RemoteEvent>>,
    }

    #[async_trait]
    impl EventTransport for RecordingTransport {
        async fn send_event(&self, event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct HangingTransport;

    #[async_trait]
    impl EventTransport for HangingTransport {
        async fn send_event(&self, _event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }

        async fn flush(&self, _timeout: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Records events; its first flush never completes.
    #[derive(Default)]
    struct StuckOnceTransport {
        stuck: AtomicBool,
        events: Mutex<Vec<RemoteEvent>>,
    }

    #[async_trait]
    impl EventTransport for StuckOnceTransport {
        async fn send_event(&self, event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn flush(&self, _timeout: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
            if !self.stuck.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl EventTransport for FailingTransport {
        async fn send_event(&self, _event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("connection refused".into())
        }
    }

    fn sink_with(transport: Arc<dyn EventTransport>) -> RemoteEventSink {
        let identity = ServiceIdentity::new("billing", false);
        let (sink, _handle) = RemoteEventSink::new(transport, identity, RemoteSinkConfig::default()).unwrap();
        sink
    }

    #[tokio::test]
    async fn partitions_fields_into_tags_and_extra() {
        let sink = sink_with(Arc::new(RecordingTransport::default()));
        let entry = LogEntry::new(
            Level::Warn,
            "quota exceeded",
            vec![
                Field::str("tenant", "acme"),
                Field::uint("status", 429),
                Field::bool("retry", false),
                Field::json("limits", serde_json::json!({"rpm": 60})),
            ],
        );

        let event = sink.to_event(&entry);

        assert_eq!(event.tags.get("tenant").map(String::as_str), Some("acme"));
        for key in ["status", "retry", "limits"] {
            assert!(event.extra.contains_key(key), "missing extra {key}");
            assert!(!event.tags.contains_key(key));
        }
        assert!(!event.extra.contains_key("tenant"));
        assert_eq!(event.extra["limits"]["rpm"], 60);
    }

    #[tokio::test]
    async fn always_attaches_bookkeeping_extras() {
        let sink = sink_with(Arc::new(RecordingTransport::default()));
        let entry = LogEntry::new(Level::Warn, "w", vec![]).with_caller(Caller::new("src/app.rs", 33));

        let event = sink.to_event(&entry);
        assert!(event.tags.is_empty());
        let extra = &event.extra;
        assert_eq!(extra["logger"], LOGGER_KIND);
        assert_eq!(extra["level"], "warn");
        assert_eq!(extra["pid"], std::process::id());
        assert_eq!(extra["caller"], "src/app.rs:33");
        assert_eq!(extra["time"], entry.timestamp.to_rfc3339());
        assert_eq!(event.level, RemoteLevel::Warning);
        assert_eq!(event.timestamp, std::time::SystemTime::from(entry.timestamp));
    }

    #[tokio::test]
    async fn message_embeds_unique_id_and_service() {
        let sink = sink_with(Arc::new(RecordingTransport::default()));
        let entry = LogEntry::new(Level::Error, "db timeout", vec![]);

        let a = sink.to_event(&entry);
        let b = sink.to_event(&entry);

        assert_ne!(a.event_id, b.event_id);
        assert_ne!(a.message, b.message);
        assert_eq!(a.message, Some(format!("[{}] - billing - db timeout", a.event_id)));
    }

    #[tokio::test]
    async fn error_events_carry_current_thread_snapshot() {
        let sink = sink_with(Arc::new(RecordingTransport::default()));

        let warn = sink.to_event(&LogEntry::new(Level::Warn, "w", vec![]));
        assert!(warn.threads.values.is_empty());

        let err = sink.to_event(&LogEntry::new(Level::Fatal, "f", vec![]));
        let threads = &err.threads.values;
        assert_eq!(threads.len(), 1);
        assert!(threads[0].current);
        assert!(!threads[0].crashed);
        let frames = &threads[0].stacktrace.as_ref().unwrap().frames;
        assert!(!frames.is_empty());
        assert!(frames.len() <= MAX_STACK_FRAMES);
    }

    #[tokio::test]
    async fn below_threshold_never_reaches_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = sink_with(transport.clone());

        sink.write(&LogEntry::new(Level::Info, "fine", vec![])).unwrap();
        sink.write(&LogEntry::new(Level::Debug, "noise", vec![])).unwrap();
        sink.flush(Duration::from_secs(1)).await.unwrap();

        assert!(transport.events.lock().unwrap().is_empty());
        assert_eq!(sink.stats().total, 0);
    }

    #[tokio::test]
    async fn flush_drains_queued_events() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = sink_with(transport.clone());

        sink.write(&LogEntry::new(Level::Warn, "same", vec![])).unwrap();
        sink.write(&LogEntry::new(Level::Warn, "same", vec![])).unwrap();
        sink.flush(Duration::from_secs(1)).await.unwrap();

        let events = transport.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].event_id, events[1].event_id);
        assert_eq!(sink.stats().sent, 2);
    }

    #[tokio::test]
    async fn hanging_flush_times_out() {
        let sink = sink_with(Arc::new(HangingTransport));

        let start = Instant::now();
        let err = sink.flush(Duration::from_millis(100)).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn timed_out_flush_does_not_stall_later_events() {
        let transport = Arc::new(StuckOnceTransport::default());
        let sink = sink_with(transport.clone());

        let err = sink.flush(Duration::from_millis(100)).await.unwrap_err();
        assert!(err.is_timeout());

        sink.write(&LogEntry::new(Level::Error, "after timeout", vec![])).unwrap();
        sink.flush(Duration::from_secs(1)).await.unwrap();

        assert_eq!(transport.events.lock().unwrap().len(), 1);
        let stats = sink.stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn transport_failures_are_counted_not_returned() {
        let sink = sink_with(Arc::new(FailingTransport));

        sink.write(&LogEntry::new(Level::Error, "boom", vec![])).unwrap();
        sink.flush(Duration::from_secs(1)).await.unwrap();

        let stats = sink.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.sent, 0);
    }

    #[test]
    fn requires_a_runtime() {
        let res = RemoteEventSink::new(
            Arc::new(RecordingTransport::default()),
            ServiceIdentity::new("svc", false),
            RemoteSinkConfig::default(),
        );
        assert!(matches!(res, Err(InitError::NoRuntime)));
    }
}
