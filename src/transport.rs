use crate::error::InitError;
use crate::event::RemoteEvent;
use async_trait::async_trait;
use sentry::types::Dsn;
use sentry::{Client, ClientOptions};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Delivery mechanism behind [`RemoteEventSink`](crate::remote::RemoteEventSink).
///
/// The sink calls these methods from its background task only; they may
/// perform network I/O freely.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Submit a single event.
    ///
    /// **Returns**
    /// - `Ok(())` if the event was accepted for delivery.
    /// - `Err(..)` if it was rejected. The sink counts the failure and moves
    ///   on; events are not retried.
    async fn send_event(&self, event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Wait for any transport-level buffering to drain.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self, _timeout: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Transport backed by a `sentry` client.
///
/// The client owns its own delivery thread; `send_event` only hands the
/// event over, `flush` waits for that thread to drain.
#[derive(Clone)]
pub struct SentryTransport {
    client: Arc<Client>,
}

impl SentryTransport {
    /// Build a transport sending to `dsn` over the default HTTP transport.
    ///
    /// **Returns**
    /// - `Err(InitError::InvalidDsn)` if the DSN cannot be parsed.
    pub fn from_dsn(dsn: &str) -> Result<Self, InitError> {
        let dsn: Dsn = dsn.trim().parse()?;
        let options = sentry::apply_defaults(ClientOptions {
            dsn: Some(dsn),
            default_integrations: false,
            attach_stacktrace: false,
            send_default_pii: false,
            ..Default::default()
        });
        Self::with_options(options)
    }

    /// Build a transport from fully specified client options.
    ///
    /// **Returns**
    /// - `Err(InitError::Transport)` if the options carry no DSN, which
    ///   would silently discard every event.
    pub fn with_options(options: ClientOptions) -> Result<Self, InitError> {
        let client = Client::from(options);
        if !client.is_enabled() {
            return Err(InitError::Transport("client has no DSN or transport".to_string()));
        }
        Ok(SentryTransport { client: Arc::new(client) })
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }
}

#[async_trait]
impl EventTransport for SentryTransport {
    async fn send_event(&self, event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        let id = self.client.capture_event(event.clone(), None);
        if id.is_nil() {
            return Err(format!("event {} was discarded by the client", event.event_id).into());
        }
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
        let client = Arc::clone(&self.client);
        let drained = tokio::task::spawn_blocking(move || client.flush(Some(timeout))).await?;
        if drained {
            Ok(())
        } else {
            Err(format!("events still pending after {:?}", timeout).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RemoteLevel;
    use sentry::test::TestTransport;
    use uuid::Uuid;

    fn recording() -> (SentryTransport, Arc<TestTransport>) {
        let collected = TestTransport::new();
        let transport = SentryTransport::with_options(ClientOptions {
            dsn: Some("https://public@errors.example.com/42".parse().unwrap()),
            transport: Some(Arc::new(collected.clone())),
            ..Default::default()
        })
        .unwrap();
        (transport, collected)
    }

    #[test]
    fn rejects_bad_dsns() {
        for dsn in ["not a url", "ftp://k@host/1", "https://host/1", "https://k@host/"] {
            let err = SentryTransport::from_dsn(dsn).err().unwrap();
            assert!(matches!(err, InitError::InvalidDsn(_)), "{dsn} accepted");
        }
    }

    #[test]
    fn client_without_dsn_is_refused() {
        let err = SentryTransport::with_options(ClientOptions::default()).err().unwrap();
        assert!(matches!(err, InitError::Transport(_)));
    }

    #[tokio::test]
    async fn submits_event_with_its_own_id() {
        let (transport, collected) = recording();
        let event = RemoteEvent {
            event_id: Uuid::new_v4(),
            message: Some("[id] - billing - db timeout".to_string()),
            level: RemoteLevel::Error,
            ..Default::default()
        };

        transport.send_event(&event).await.unwrap();
        transport.flush(Duration::from_secs(1)).await.unwrap();

        let sent = collected.fetch_and_clear_events();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_id, event.event_id);
        assert_eq!(sent[0].message, event.message);
        assert_eq!(sent[0].level, RemoteLevel::Error);
    }
}
