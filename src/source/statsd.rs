//! The statsd source.
//!
//! A blocking UDP listener on its own thread. Each datagram is split on line
//! boundaries and every line parsed independently; well-formed samples go
//! down the event channel and the listener accounts for the rest by
//! injecting `statsd.bad_lines_seen` / `statsd.packets_received` counter
//! samples into the same stream, so the daemon's own bookkeeping takes the
//! exact path user metrics do.

use metric::{Event, Sample};
use protocols::statsd::parse_statsd;
use source::Source;
use std::net::UdpSocket;
use std::str;
use util;
use util::send;

/// Configuration for the statsd source.
#[derive(Clone, Debug)]
pub struct StatsdConfig {
    /// The address for the statsd source to bind to.
    pub host: String,
    /// The port for the statsd source to listen on.
    pub port: u16,
    /// Log every received line; for debugging clients.
    pub dump_messages: bool,
}

/// The statsd source.
pub struct Statsd {
    chans: util::Channel,
    host: String,
    port: u16,
    dump_messages: bool,
}

impl Statsd {
    /// Create a new statsd source.
    pub fn new(chans: util::Channel, config: StatsdConfig) -> Statsd {
        Statsd {
            chans: chans,
            host: config.host,
            port: config.port,
            dump_messages: config.dump_messages,
        }
    }
}

/// Parse one datagram payload and forward everything it holds.
pub fn handle_payload(chans: &mut util::Channel, payload: &str, dump_messages: bool) {
    if dump_messages {
        for line in payload.lines() {
            if !line.is_empty() {
                info!("{}", line);
            }
        }
    }
    let mut samples = Vec::new();
    let bad_lines = parse_statsd(payload, &mut samples);
    for sample in samples {
        send(chans, Event::Sample(sample));
    }
    if bad_lines > 0 {
        debug!("{} malformed line(s) in payload {:?}", bad_lines, payload);
        send(
            chans,
            Event::Sample(Sample::counter("statsd.bad_lines_seen", bad_lines as f64)),
        );
    }
    send(
        chans,
        Event::Sample(Sample::counter("statsd.packets_received", 1.0)),
    );
}

impl Source for Statsd {
    fn run(&mut self) {
        let socket = match UdpSocket::bind((self.host.as_str(), self.port)) {
            Ok(socket) => socket,
            Err(e) => {
                error!(
                    "unable to bind udp socket on {}:{}: {}",
                    self.host, self.port, e
                );
                return;
            }
        };
        info!("statsd server started on {}:{}", self.host, self.port);
        let mut buf = vec![0; 16_250];
        loop {
            let len = match socket.recv_from(&mut buf) {
                Ok((len, _)) => len,
                Err(e) => {
                    error!("could not read udp socket: {}", e);
                    continue;
                }
            };
            match str::from_utf8(&buf[..len]) {
                Ok(payload) => {
                    trace!("statsd - {}", payload);
                    handle_payload(&mut self.chans, payload, self.dump_messages);
                }
                Err(e) => {
                    debug!("payload not valid utf-8: {}", e);
                    // the whole datagram counts as one bad line
                    send(
                        &mut self.chans,
                        Event::Sample(Sample::counter("statsd.bad_lines_seen", 1.0)),
                    );
                    send(
                        &mut self.chans,
                        Event::Sample(Sample::counter("statsd.packets_received", 1.0)),
                    );
                }
            }
        }
    }
}
