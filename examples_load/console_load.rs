use std::io;
use std::sync::Arc;
use std::time::Instant;

use logtee::console::{ConsoleFormat, ConsoleSink};
use logtee::identity::ServiceIdentity;
use logtee::sink::{LogSink, SinkConfig};
use logtee::tee::Tee;
use logtee::{Field, Logger};

/// Measures encoding and dispatch cost of the console sink; output goes to
/// `io::sink()` so terminal speed stays out of the numbers.
fn main() {
    let json: Arc<dyn LogSink> = Arc::new(ConsoleSink::with_writer(
        Box::new(io::sink()),
        ConsoleFormat::Json,
        SinkConfig::default(),
    ));
    let text: Arc<dyn LogSink> = Arc::new(ConsoleSink::with_writer(
        Box::new(io::sink()),
        ConsoleFormat::Text,
        SinkConfig::default(),
    ));

    for (label, sink) in [("json", json), ("text", text)] {
        let logger = Logger::new(Tee::new(vec![sink]), ServiceIdentity::new("load", false));

        let n: u64 = 100_000;
        let start = Instant::now();

        for i in 0..n {
            logger.error(
                "console load test error",
                vec![Field::uint("iteration", i), Field::str("path", "/users/42")],
            );
        }

        let elapsed = start.elapsed();
        println!("{} console sink: wrote {} entries in {:?} (~{:.0} entries/s)",
            label,
            n,
            elapsed,
            n as f64 / elapsed.as_secs_f64()
        );
    }
}
