extern crate chan_signal;
extern crate chrono;
extern crate fern;
extern crate tallyd;

#[macro_use]
extern crate log;

use chrono::Utc;
use std::cmp;
use std::process;
use std::sync::mpsc;
use std::thread;
use tallyd::config;
use tallyd::engine::Engine;
use tallyd::metric::Event;
use tallyd::sink;
use tallyd::source::{FlushTimer, Source, Statsd, StatsdConfig};
use tallyd::time;

fn main() {
    let args = match config::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let mut level = match args.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    if args.debug {
        level = cmp::max(level, log::LevelFilter::Debug);
    }

    // signal delivery is owned by this thread; register before anything
    // else spawns
    let signal =
        chan_signal::notify(&[chan_signal::Signal::INT, chan_signal::Signal::TERM]);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                record.target(),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .expect("could not set up logging");

    info!("tallyd - {}", args.version);

    let (sink_chans, sink_workers) = sink::factory(&args);
    if sink_chans.is_empty() {
        warn!("no sinks configured; windows will be reduced and discarded");
    }

    let (event_send, event_recv) = mpsc::sync_channel(args.batch);

    let mut engine = Engine::new(&args, sink_chans);
    let engine_worker = thread::spawn(move || engine.run(event_recv));

    let statsd_config = StatsdConfig {
        host: args.host.clone(),
        port: args.port,
        dump_messages: args.dump_messages,
    };
    let statsd_chans = vec![event_send.clone()];
    thread::spawn(move || Statsd::new(statsd_chans, statsd_config).run());

    let flush_chans = vec![event_send.clone()];
    let flush_interval = args.flush_interval;
    thread::spawn(move || FlushTimer::new(flush_chans, flush_interval).run());

    thread::spawn(move || time::update_time());

    signal.recv().expect("signal channel hung up");
    info!("shutdown signal received, flushing");

    // the engine flushes a final best-effort window, tells every sink to
    // stop and exits; the detached source threads die with the process
    let _ = event_send.send(Event::Shutdown);
    engine_worker.join().expect("failed to join engine");
    for worker in sink_workers {
        worker.join().expect("failed to join sink worker");
    }
}
