//! The types that move between threads: parsed samples, flush snapshots and
//! the events that carry them.

use std::sync::Arc;

/// A single parsed statsd sample.
///
/// Samples are produced by `protocols::statsd` and consumed exactly once by
/// `buckets::Buckets`. The sample rate is the fraction of true events the
/// client actually sent, always in `(0, 1]`; `1.0` means unsampled.
#[derive(Clone, Debug, PartialEq)]
pub enum Sample {
    /// A per-window accumulator increment. The store adds `value / rate`.
    Counter {
        /// metric name
        name: String,
        /// increment before rate correction
        value: f64,
        /// client-side sample rate
        rate: f64,
    },
    /// One duration observation for a summarized timer.
    Timer {
        /// metric name
        name: String,
        /// observed duration
        value: f64,
        /// client-side sample rate
        rate: f64,
    },
    /// A last-value-wins gauge sample, or a signed adjustment of one.
    Gauge {
        /// metric name
        name: String,
        /// new value, or signed delta when `delta` is set
        value: f64,
        /// true when the wire value carried a `+`/`-` prefix
        delta: bool,
    },
    /// One member for a per-window cardinality set.
    Set {
        /// metric name
        name: String,
        /// opaque member token, kept verbatim from the wire
        member: String,
    },
}

impl Sample {
    /// Create an unsampled counter increment.
    pub fn counter(name: &str, value: f64) -> Sample {
        Sample::Counter {
            name: name.to_string(),
            value: value,
            rate: 1.0,
        }
    }

    /// Create an unsampled timer observation.
    pub fn timer(name: &str, value: f64) -> Sample {
        Sample::Timer {
            name: name.to_string(),
            value: value,
            rate: 1.0,
        }
    }

    /// Create an absolute gauge sample.
    pub fn gauge(name: &str, value: f64) -> Sample {
        Sample::Gauge {
            name: name.to_string(),
            value: value,
            delta: false,
        }
    }

    /// Create a signed gauge adjustment.
    pub fn delta_gauge(name: &str, value: f64) -> Sample {
        Sample::Gauge {
            name: name.to_string(),
            value: value,
            delta: true,
        }
    }

    /// Create a set membership sample.
    pub fn set(name: &str, member: &str) -> Sample {
        Sample::Set {
            name: name.to_string(),
            member: member.to_string(),
        }
    }

    /// The metric name, whatever the sample type.
    pub fn name(&self) -> &str {
        match *self {
            Sample::Counter { ref name, .. }
            | Sample::Timer { ref name, .. }
            | Sample::Gauge { ref name, .. }
            | Sample::Set { ref name, .. } => name,
        }
    }
}

/// The rendered result of one flush window: a flat key/value list stamped
/// with a single unix timestamp. Shared with every sink through an `Arc`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlushSnapshot {
    /// unix seconds, stamped once at drain time
    pub timestamp: i64,
    /// fully namespaced key -> value pairs
    pub stats: Vec<(String, f64)>,
}

/// Events routed over the channels between sources, the engine and sinks.
#[derive(Clone, Debug)]
pub enum Event {
    /// A parsed sample on its way to the engine.
    Sample(Sample),
    /// A flush pulse with a monotonically increasing index.
    TimerFlush(u64),
    /// A reduced window on its way to the sinks.
    Snapshot(Arc<FlushSnapshot>),
    /// Orderly stop; receivers finish their work and exit.
    Shutdown,
}
