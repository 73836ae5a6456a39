//! The aggregation engine and flush scheduler.
//!
//! The engine owns the `Buckets` and is the single consumer of the event
//! channel, so ingest and flush are serialized by construction: the drain
//! step can never observe a half-applied sample, no sample is counted in two
//! windows and a sample queued behind a flush tick lands in the next window.
//! Sinks hang off their own bounded channels; a slow sink loses windows, it
//! never stalls the engine.

use buckets::{Buckets, INTERNAL_PREFIX};
use config::Args;
use metric::{Event, FlushSnapshot, Sample};
use reduce;
use regex::Regex;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TrySendError};
use std::time::Instant;
use time;
use util;

/// Compiled histogram configuration for one family of timers.
struct HistogramMask {
    mask: Regex,
    bins: Vec<f64>,
}

/// The aggregation engine.
///
/// Constructed once at startup, handed the sink channels and moved into its
/// own thread. Everything it needs from the configuration is copied in here;
/// the engine never consults global state.
pub struct Engine {
    buckets: Buckets,
    chans: util::Channel,
    flush_interval: u64,
    percentiles: Vec<f64>,
    masks: Vec<HistogramMask>,
    legacy_namespace: bool,
    global_prefix: String,
    prefix_counter: String,
    prefix_timer: String,
    prefix_gauge: String,
    prefix_set: String,
    prefix_stats: String,
    last_flush_idx: u64,
}

impl Engine {
    /// Build the engine from validated configuration.
    ///
    /// Seeds the self-observation counters so `bad_lines_seen` and
    /// `packets_received` are present from the very first flush.
    pub fn new(args: &Args, chans: util::Channel) -> Engine {
        let masks = args.histogram
            .iter()
            .map(|hist| {
                HistogramMask {
                    // patterns were compiled once already in config::validate
                    mask: Regex::new(&hist.metric).expect("histogram pattern did not survive validation"),
                    bins: hist.bins.clone(),
                }
            })
            .collect();
        let mut buckets = Buckets::new(args.delete_counters);
        buckets.add(Sample::counter("statsd.bad_lines_seen", 0.0));
        buckets.add(Sample::counter("statsd.packets_received", 0.0));
        Engine {
            buckets: buckets,
            chans: chans,
            flush_interval: args.flush_interval,
            percentiles: args.percent_threshold.clone(),
            masks: masks,
            legacy_namespace: args.graphite.legacy_namespace,
            global_prefix: args.graphite.global_prefix.clone(),
            prefix_counter: args.graphite.prefix_counter.clone(),
            prefix_timer: args.graphite.prefix_timer.clone(),
            prefix_gauge: args.graphite.prefix_gauge.clone(),
            prefix_set: args.graphite.prefix_set.clone(),
            prefix_stats: args.prefix_stats.clone(),
            last_flush_idx: 0,
        }
    }

    /// Consume events until the channel hangs up or `Shutdown` arrives.
    pub fn run(&mut self, recv: Receiver<Event>) {
        loop {
            match recv.recv() {
                Ok(event) => {
                    if !self.process(event) {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    }

    /// Handle a single event. Returns false once the engine should stop.
    pub fn process(&mut self, event: Event) -> bool {
        match event {
            Event::Sample(sample) => {
                self.buckets.add(sample);
                true
            }
            Event::TimerFlush(idx) => {
                self.flush(idx);
                true
            }
            // snapshots flow engine -> sink only
            Event::Snapshot(_) => true,
            Event::Shutdown => {
                // best-effort final window before the sinks are told to stop
                let idx = self.last_flush_idx.wrapping_add(1);
                self.flush(idx);
                for chan in &self.chans {
                    let _ = chan.send(Event::Shutdown);
                }
                false
            }
        }
    }

    /// Drain the buckets, reduce every entry, stamp the window and fan the
    /// snapshot out to the sinks.
    fn flush(&mut self, idx: u64) {
        if idx <= self.last_flush_idx {
            warn!(
                "flush tick {} arrived at or behind {}, ignoring",
                idx, self.last_flush_idx
            );
            return;
        }
        self.last_flush_idx = idx;

        let start = Instant::now();
        let window = self.buckets.drain();
        let timestamp = time::now();

        let mut stats: Vec<(String, f64)> = Vec::with_capacity(
            2 * window.counters.len() + window.gauges.len() + window.sets.len()
                + 12 * window.timers.len() + 1,
        );
        let mut num_stats = 0;

        for (name, total) in &window.counters {
            if !name.starts_with(INTERNAL_PREFIX) {
                num_stats += 1;
            }
            let rate = reduce::counter_rate(*total, self.flush_interval);
            if self.legacy_namespace {
                stats.push((format!("{}.{}.rate", self.prefix_stats, name), rate));
                stats.push((format!("{}.{}.count", self.prefix_stats, name), *total));
            } else {
                stats.push((
                    format!("{}.{}.{}.rate", self.global_prefix, self.prefix_counter, name),
                    rate,
                ));
                stats.push((
                    format!("{}.{}.{}.count", self.global_prefix, self.prefix_counter, name),
                    *total,
                ));
            }
        }

        for (name, bucket) in &window.timers {
            if !name.starts_with(INTERNAL_PREFIX) {
                num_stats += 1;
            }
            let bins = self.masks
                .iter()
                .find(|hist| hist.mask.is_match(name))
                .map(|hist| hist.bins.as_slice());
            for (suffix, value) in
                reduce::summarize_timer(bucket, self.flush_interval, &self.percentiles, bins)
            {
                let key = if self.legacy_namespace {
                    format!("{}.{}.{}", self.prefix_stats, name, suffix)
                } else {
                    format!(
                        "{}.{}.{}.{}",
                        self.global_prefix, self.prefix_timer, name, suffix
                    )
                };
                stats.push((key, value));
            }
        }

        for (name, value) in &window.gauges {
            if !name.starts_with(INTERNAL_PREFIX) {
                num_stats += 1;
            }
            let key = if self.legacy_namespace {
                format!("{}.{}", self.prefix_stats, name)
            } else {
                format!("{}.{}.{}", self.global_prefix, self.prefix_gauge, name)
            };
            stats.push((key, *value));
        }

        for (name, members) in &window.sets {
            if !name.starts_with(INTERNAL_PREFIX) {
                num_stats += 1;
            }
            let key = if self.legacy_namespace {
                format!("{}.{}.count", self.prefix_stats, name)
            } else {
                format!("{}.{}.{}.count", self.global_prefix, self.prefix_set, name)
            };
            stats.push((key, members.len() as f64));
        }

        let num_stats_key = if self.legacy_namespace {
            format!("{}.numStats", self.prefix_stats)
        } else {
            format!("{}.{}.numStats", self.global_prefix, self.prefix_stats)
        };
        stats.push((num_stats_key, f64::from(num_stats)));

        let snapshot = Arc::new(FlushSnapshot {
            timestamp: timestamp,
            stats: stats,
        });
        for chan in &self.chans {
            match chan.try_send(Event::Snapshot(Arc::clone(&snapshot))) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("sink channel full, dropping window {}", idx);
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("sink channel hung up, dropping window {}", idx);
                }
            }
        }

        let spent_ms = time::elapsed_ns(start) / 1_000_000;
        self.buckets
            .add(Sample::gauge("statsd.processing_time", spent_ms as f64));
        if spent_ms > self.flush_interval {
            warn!(
                "flush {} overran the {}ms interval, took {}ms",
                idx, self.flush_interval, spent_ms
            );
            self.buckets.add(Sample::counter("statsd.flush_overruns", 1.0));
        }
    }
}
