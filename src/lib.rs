//! Tallyd is a statsd-compatible metrics aggregation daemon. It ingests
//! loss-tolerant metric samples -- counters, timers, gauges and sets -- over
//! UDP, aggregates them over a fixed flush window and periodically emits the
//! reduced statistics to one or more sinks. The reference sink speaks the
//! graphite plaintext protocol over a persistent TCP connection.
//!
//! The pieces, in the order a sample moves through them:
//!
//!  * `source::Statsd` receives datagrams and hands each line to the parser.
//!  * `protocols::statsd` turns a line into a typed `metric::Sample`.
//!  * `buckets::Buckets` accumulates samples between flushes.
//!  * `engine::Engine` owns the buckets, drains them on every flush tick and
//!    renders the flat key/value snapshot.
//!  * `reduce` holds the pure per-type reductions.
//!  * `sink` delivers snapshots; `sink::Graphite` is the reference sink.
//!
//! Ingest and flush meet only at the engine's event channel, which is what
//! makes the drain step atomic: the engine is the sole owner of the buckets.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate chrono;
extern crate clap;
extern crate fnv;
extern crate regex;
extern crate serde;
extern crate toml;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
extern crate rand;
#[cfg(test)]
extern crate tempdir;

pub mod buckets;
pub mod config;
pub mod engine;
pub mod metric;
pub mod protocols;
pub mod reduce;
pub mod sink;
pub mod source;
pub mod time;
pub mod util;
