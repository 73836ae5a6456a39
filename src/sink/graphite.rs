//! The graphite plaintext sink, the reference destination.
//!
//! One line per metric per window: `<key> <value> <unix-seconds>\n`. The TCP
//! connection is opened lazily on the first flush and reused for every
//! window after that; it is only torn down when a write fails. Failure
//! policy is drop-and-log: the window that hit the error is gone and the
//! sink reconnects on the next flush.

use metric::FlushSnapshot;
use sink::{DeliveryError, Sink};
use std::io;
use std::io::Write as IoWrite;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time;

// Bound on connect and write; a hung collector must not wedge the sink
// thread past the point where dropping windows can save it.
const IO_TIMEOUT_MS: u64 = 10_000;

/// Configuration for the graphite sink.
#[derive(Clone, Debug)]
pub struct GraphiteConfig {
    /// The collector host to deliver to.
    pub host: String,
    /// The collector port.
    pub port: u16,
    /// Key prefix for the sink's own delivery statistics
    /// (`<prefix>.flush_time` and friends).
    pub stats_prefix: String,
}

/// The graphite sink.
pub struct Graphite {
    host: String,
    port: u16,
    stats_prefix: String,
    stream: Option<TcpStream>,
    flush_time_ms: f64,
    flush_length: f64,
    last_flush: f64,
    last_exception: f64,
}

fn connect(host: &str, port: u16) -> Result<TcpStream, DeliveryError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(DeliveryError::Resolve)?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, Duration::from_millis(IO_TIMEOUT_MS)) {
            Ok(stream) => {
                stream
                    .set_write_timeout(Some(Duration::from_millis(IO_TIMEOUT_MS)))
                    .map_err(DeliveryError::Connect)?;
                return Ok(stream);
            }
            Err(e) => {
                info!("unable to connect to {}:{} at {}: {}", host, port, addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(DeliveryError::Connect(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::Other, "endpoint resolved to no addresses")
    })))
}

fn fmt_line(buf: &mut String, key: &str, value: f64, timestamp: i64) {
    buf.push_str(key);
    buf.push_str(" ");
    buf.push_str(&value.to_string());
    buf.push_str(" ");
    buf.push_str(&timestamp.to_string());
    buf.push_str("\n");
}

impl Graphite {
    /// Create a new graphite sink. No connection is made until the first
    /// window arrives.
    pub fn new(config: GraphiteConfig) -> Graphite {
        let boot = time::now() as f64;
        Graphite {
            host: config.host,
            port: config.port,
            stats_prefix: config.stats_prefix,
            stream: None,
            flush_time_ms: 0.0,
            flush_length: 0.0,
            last_flush: boot,
            last_exception: boot,
        }
    }

    /// Serialize a snapshot, plus this sink's own delivery statistics from
    /// the previous window, into the plaintext protocol.
    pub fn format_stats(&self, snapshot: &FlushSnapshot) -> String {
        let mut buf = String::with_capacity(8_192);
        for &(ref key, value) in &snapshot.stats {
            fmt_line(&mut buf, key, value, snapshot.timestamp);
        }
        let prefix = &self.stats_prefix;
        fmt_line(
            &mut buf,
            &format!("{}.flush_time", prefix),
            self.flush_time_ms,
            snapshot.timestamp,
        );
        fmt_line(
            &mut buf,
            &format!("{}.flush_length", prefix),
            self.flush_length,
            snapshot.timestamp,
        );
        fmt_line(
            &mut buf,
            &format!("{}.last_flush", prefix),
            self.last_flush,
            snapshot.timestamp,
        );
        fmt_line(
            &mut buf,
            &format!("{}.last_exception", prefix),
            self.last_exception,
            snapshot.timestamp,
        );
        buf
    }
}

impl Sink for Graphite {
    fn deliver(&mut self, snapshot: Arc<FlushSnapshot>) -> Result<(), DeliveryError> {
        let start = Instant::now();
        let payload = self.format_stats(&snapshot);

        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => match connect(&self.host, self.port) {
                Ok(stream) => stream,
                Err(e) => {
                    self.last_exception = time::now() as f64;
                    return Err(e);
                }
            },
        };

        match stream.write_all(payload.as_bytes()) {
            Ok(()) => {
                // hold the connection for the next window
                self.stream = Some(stream);
                self.flush_time_ms = (time::elapsed_ns(start) / 1_000_000) as f64;
                self.flush_length = payload.len() as f64;
                self.last_flush = time::now() as f64;
                Ok(())
            }
            Err(e) => {
                self.last_exception = time::now() as f64;
                Err(DeliveryError::Write(e))
            }
        }
    }
}
