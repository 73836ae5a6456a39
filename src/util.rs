//! Utility module, a grab-bag of functionality

use metric;
use std::sync::mpsc;

/// A vector of bounded event senders. The bound is what turns a lagging
/// receiver into backpressure instead of unbounded memory.
pub type Channel = Vec<mpsc::SyncSender<metric::Event>>;

/// Send a `metric::Event` into every channel, cloning for all but the last.
///
/// A send into a hung-up channel is dropped silently; receivers only
/// disappear during shutdown and the event would have been discarded anyway.
pub fn send(chans: &mut Channel, event: metric::Event) {
    if chans.is_empty() {
        return;
    }
    let max: usize = chans.len().saturating_sub(1);
    if max == 0 {
        let _ = chans[0].send(event);
    } else {
        for chan in &mut chans[1..] {
            let _ = chan.send(event.clone());
        }
        let _ = chans[0].send(event);
    }
}
