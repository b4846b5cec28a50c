use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use logtee::event::RemoteEvent;
use logtee::identity::ServiceIdentity;
use logtee::remote::{RemoteEventSink, RemoteSinkConfig};
use logtee::sink::LogSink;
use logtee::transport::EventTransport;
use logtee::{Field, Level, LogEntry};
use tokio::time::Duration;

/// Accepts everything instantly; isolates the cost of mapping and queueing.
struct DiscardTransport;

#[async_trait]
impl EventTransport for DiscardTransport {
    async fn send_event(&self, _event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let config = RemoteSinkConfig {
        channel_buffer: 50_000,
        ..RemoteSinkConfig::default()
    };
    let (sink, _handle) = RemoteEventSink::new(
        Arc::new(DiscardTransport),
        ServiceIdentity::new("load", false),
        config,
    )
    .expect("tokio runtime is running");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        // Warn keeps stack capture out of the measurement.
        let entry = LogEntry::new(Level::Warn, "remote load test", vec![Field::uint("iteration", i)]);
        let _ = sink.write(&entry);
    }

    let elapsed = start.elapsed();
    println!("remote sink: queued {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    if let Err(e) = sink.flush(Duration::from_secs(2)).await {
        println!("flush: {}", e);
    }
    println!("{:?}", sink.stats());
}
