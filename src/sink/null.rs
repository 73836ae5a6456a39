//! Null sink
//!
//! This sink is intended for testing and demonstration. Every window it
//! receives is deallocated.

use metric::FlushSnapshot;
use sink::{DeliveryError, Sink};
use std::sync::Arc;

/// The null sink.
pub struct Null {}

impl Null {
    /// Create a new null sink.
    pub fn new() -> Null {
        Null {}
    }
}

impl Sink for Null {
    fn deliver(&mut self, _: Arc<FlushSnapshot>) -> Result<(), DeliveryError> {
        // discard the window, intentionally
        Ok(())
    }
}
