//! The source of all flush pulses.

use metric::Event;
use source::Source;
use std::thread::sleep;
use std::time::Duration;
use util;
use util::send;

/// The flush timer. Fires a `TimerFlush` every `interval` milliseconds,
/// measured from process start and independent of how long any flush takes;
/// a slow flush queues ticks behind it rather than stretching the window.
pub struct FlushTimer {
    chans: util::Channel,
    interval: u64,
}

impl FlushTimer {
    /// Create a new FlushTimer firing every `interval` milliseconds. This
    /// will not produce a new thread; that must be managed by the end-user.
    pub fn new(chans: util::Channel, interval: u64) -> FlushTimer {
        FlushTimer {
            chans: chans,
            interval: interval,
        }
    }
}

impl Source for FlushTimer {
    fn run(&mut self) {
        let duration = Duration::from_millis(self.interval);
        // idx only ever increases. A u64 of millisecond-or-slower ticks will
        // not wrap inside any plausible process lifetime.
        let mut idx: u64 = 0;
        loop {
            sleep(duration);
            idx += 1;
            send(&mut self.chans, Event::TimerFlush(idx));
        }
    }
}
