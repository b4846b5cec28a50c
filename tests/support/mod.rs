#![allow(dead_code)]

use async_trait::async_trait;
use logtee::console::{ConsoleFormat, ConsoleSink};
use logtee::event::RemoteEvent;
use logtee::identity::ServiceIdentity;
use logtee::remote::{RemoteEventSink, RemoteSinkConfig};
use logtee::sink::{LogSink, SinkConfig};
use logtee::tee::Tee;
use logtee::transport::EventTransport;
use logtee::{Level, Logger};
use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8(buf.clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub events: Mutex<Vec<RemoteEvent>>,
}

#[async_trait]
impl EventTransport for RecordingTransport {
    async fn send_event(&self, event: &RemoteEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Console (JSON, from info) + remote (from warn) pipeline with captured output.
pub fn pipeline(dev_mode: bool) -> (Logger, Captured, Arc<RecordingTransport>) {
    let identity = ServiceIdentity::new("users-api", dev_mode);
    let out = Captured::default();
    let transport = Arc::new(RecordingTransport::default());

    let console: Arc<dyn LogSink> = Arc::new(ConsoleSink::with_writer(
        Box::new(out.clone()),
        ConsoleFormat::Json,
        SinkConfig::new(Level::Info),
    ));
    let (remote, _handle) =
        RemoteEventSink::new(transport.clone(), Arc::clone(&identity), RemoteSinkConfig::default()).unwrap();

    let logger = Logger::new(Tee::new(vec![console, Arc::new(remote)]), identity);
    (logger, out, transport)
}
