//! Round-trip time tracking for locally originated Data messages.
//!
//! One outstanding measurement per destination. A new send to the same
//! destination overwrites the previous timestamp, and a measurement whose
//! Ack never returns simply stays in the table until overwritten or
//! cleared.

use crate::PeerIdentity;
use std::collections::HashMap;
use std::time::Duration;

/// Outstanding send timestamps keyed by destination.
#[derive(Clone, Debug, Default)]
pub struct RttTracker {
    pending: HashMap<PeerIdentity, u64>,
}

impl RttTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a Data message to `destination` left at `sent_at_ms`.
    pub fn record_send(&mut self, destination: PeerIdentity, sent_at_ms: u64) {
        self.pending.insert(destination, sent_at_ms);
    }

    /// Complete the measurement for `destination`.
    ///
    /// Both timestamps come from the local clock; a clock that stepped
    /// backwards yields zero rather than a negative duration.
    pub fn complete(&mut self, destination: &PeerIdentity, now_ms: u64) -> Option<Duration> {
        self.pending
            .remove(destination)
            .map(|sent| Duration::from_millis(now_ms.saturating_sub(sent)))
    }

    /// Send timestamp awaiting an Ack, if any.
    pub fn pending_since(&self, destination: &PeerIdentity) -> Option<u64> {
        self.pending.get(destination).copied()
    }

    /// Drop the measurement for `destination`.
    pub fn forget(&mut self, destination: &PeerIdentity) -> bool {
        self.pending.remove(destination).is_some()
    }

    /// Number of outstanding measurements.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every outstanding measurement.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
