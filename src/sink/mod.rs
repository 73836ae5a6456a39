//! Sinks accept reduced flush windows and deliver them somewhere else.
//!
//! Each sink runs on its own thread with its own bounded channel, so a slow
//! or unreachable destination is that sink's problem alone. Sinks are
//! expected to deliver windows in the order they arrive; the channel FIFO
//! gives them that for free.

use config;
use metric::{Event, FlushSnapshot};
use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;

mod console;
mod graphite;
mod null;

pub use self::console::Console;
pub use self::graphite::{Graphite, GraphiteConfig};
pub use self::null::Null;

// Windows queued per sink before the engine starts dropping them. Sized in
// windows, not bytes: one stuck flush interval is one lost entry.
const SINK_QUEUE_DEPTH: usize = 8;

/// Why a sink failed to deliver a window. The window in question is gone
/// either way; this is a telemetry pipeline and nothing is replayed.
#[derive(Debug)]
pub enum DeliveryError {
    /// The destination hostname did not resolve.
    Resolve(io::Error),
    /// No connection could be established to any resolved address.
    Connect(io::Error),
    /// The write failed mid-delivery; the connection is torn down.
    Write(io::Error),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DeliveryError::Resolve(ref e) => write!(f, "unable to resolve endpoint: {}", e),
            DeliveryError::Connect(ref e) => write!(f, "unable to connect: {}", e),
            DeliveryError::Write(ref e) => write!(f, "write failed: {}", e),
        }
    }
}

impl Error for DeliveryError {}

/// A 'sink' is a sink for flush snapshots.
pub trait Sink {
    /// Deliver one window to the destination. An `Err` means the window was
    /// dropped; the sink must come back ready to try the next one.
    fn deliver(&mut self, snapshot: Arc<FlushSnapshot>) -> Result<(), DeliveryError>;

    /// The sink's event loop: deliver snapshots as they arrive, log and
    /// carry on when delivery fails, stop on `Shutdown`.
    fn run(&mut self, recv: Receiver<Event>) {
        loop {
            match recv.recv() {
                Ok(Event::Snapshot(snapshot)) => {
                    if let Err(e) = self.deliver(snapshot) {
                        error!("dropping window: {}", e);
                    }
                }
                Ok(Event::Shutdown) | Err(_) => return,
                // samples and flush ticks are not routed to sinks
                Ok(_) => {}
            }
        }
    }
}

/// Creates the collection of sinks based on the configuration.
///
/// Each configured sink gets a thread and a bounded channel; the returned
/// senders are what the engine fans snapshots out to, the handles are joined
/// at shutdown.
pub fn factory(args: &config::Args) -> (Vec<SyncSender<Event>>, Vec<thread::JoinHandle<()>>) {
    let mut chans = Vec::new();
    let mut workers = Vec::new();

    if let Some(ref graphite_host) = args.graphite_host {
        let config = GraphiteConfig {
            host: graphite_host.clone(),
            port: args.graphite_port,
            stats_prefix: if args.graphite.legacy_namespace {
                format!("{}.graphiteStats", args.prefix_stats)
            } else {
                format!(
                    "{}.{}.graphiteStats",
                    args.graphite.global_prefix, args.prefix_stats
                )
            },
        };
        let (send, recv) = sync_channel(SINK_QUEUE_DEPTH);
        chans.push(send);
        workers.push(thread::spawn(move || Graphite::new(config).run(recv)));
    }
    if args.console {
        let (send, recv) = sync_channel(SINK_QUEUE_DEPTH);
        chans.push(send);
        workers.push(thread::spawn(move || Console::new().run(recv)));
    }
    if args.null {
        let (send, recv) = sync_channel(SINK_QUEUE_DEPTH);
        chans.push(send);
        workers.push(thread::spawn(move || Null::new().run(recv)));
    }

    (chans, workers)
}
