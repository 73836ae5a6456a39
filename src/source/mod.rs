//! Sources produce the events the engine consumes.

mod flush;
mod statsd;

pub use self::flush::FlushTimer;
pub use self::statsd::{Statsd, StatsdConfig};

/// A source pushes events into the pipeline for as long as the process runs.
pub trait Source {
    /// Run the source. Sources do not return under normal operation; the
    /// caller gives each one a thread and the process reaps them at exit.
    fn run(&mut self) -> ();
}
