//! A sink that prints every window to stdout, for debugging a tallyd
//! installation without a collector in reach.

use chrono;
use metric::FlushSnapshot;
use sink::{DeliveryError, Sink};
use std::sync::Arc;

/// The console sink.
pub struct Console {}

impl Console {
    /// Create a new console sink.
    pub fn new() -> Console {
        Console {}
    }
}

/// Print a single stats line.
fn fmt_line(key: &str, value: f64) {
    println!("    {}: {}", key, value)
}

impl Sink for Console {
    fn deliver(&mut self, snapshot: Arc<FlushSnapshot>) -> Result<(), DeliveryError> {
        let now = chrono::Utc::now();
        println!("Flushing metrics: {}", now.to_rfc3339());
        for &(ref key, value) in &snapshot.stats {
            fmt_line(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use metric::FlushSnapshot;
    use std::sync::Arc;

    #[test]
    fn test_deliver_never_fails() {
        let mut console = Console::new();
        let snapshot = Arc::new(FlushSnapshot {
            timestamp: 10,
            stats: vec![("stats.statsd.numStats".to_string(), 0.0)],
        });
        assert!(console.deliver(snapshot).is_ok());
    }
}
