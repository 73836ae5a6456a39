//! Process-wide clock.
//!
//! Flush timestamps only need second resolution so we keep the current unix
//! time in an atomic that a background thread refreshes, sparing the hot
//! ingest path a syscall per sample.

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use std::{thread, time};

lazy_static! {
    static ref NOW: Arc<AtomicUsize> =
        Arc::new(AtomicUsize::new(Utc::now().timestamp() as usize));
}

/// The current unix time in seconds, cached at half-second granularity.
pub fn now() -> i64 {
    NOW.load(Ordering::Relaxed) as i64
}

/// Nanoseconds elapsed since `i`, saturating rather than wrapping.
pub fn elapsed_ns(i: Instant) -> u64 {
    let elapsed = i.elapsed();
    (elapsed.as_secs().saturating_mul(1_000_000_000))
        .saturating_add(u64::from(elapsed.subsec_nanos()))
}

/// Refresh the cached clock. Never returns; the caller gives it a thread.
pub fn update_time() {
    let dur = time::Duration::from_millis(500);
    loop {
        thread::sleep(dur);
        let now = Utc::now().timestamp() as usize;
        NOW.store(now, Ordering::Relaxed);
    }
}
