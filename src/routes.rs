//! Route entries shown to the presentation layer.
//!
//! One [`RouteEntry`] per destination ever learned through gossip, in the
//! order they were learned. Entries carry the last message body received
//! from that destination and the last measured round-trip time to it.

use crate::PeerIdentity;
use serde::Serialize;
use std::time::Duration;

/// Read-model entry for one reachable destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    /// The reachable node.
    pub destination: PeerIdentity,
    /// Body of the last Data message received from it (empty if none).
    pub last_message: String,
    /// Last measured round-trip time to it.
    pub rtt: Option<Duration>,
}

impl RouteEntry {
    /// Create an entry with no message and no RTT.
    pub fn new(destination: PeerIdentity) -> Self {
        Self {
            destination,
            last_message: String::new(),
            rtt: None,
        }
    }

    /// RTT as display text, empty until measured.
    pub fn rtt_display(&self) -> String {
        match self.rtt {
            Some(rtt) => format!("{}ms", rtt.as_millis()),
            None => String::new(),
        }
    }
}

/// Ordered collection of route entries, at most one per destination.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry for `destination` unless one exists.
    ///
    /// Returns true if a new entry was created.
    pub fn ensure(&mut self, destination: &PeerIdentity) -> bool {
        if self.get(destination).is_some() {
            return false;
        }
        self.entries.push(RouteEntry::new(destination.clone()));
        true
    }

    /// Get the entry for `destination`.
    pub fn get(&self, destination: &PeerIdentity) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.destination == *destination)
    }

    /// Get the entry for `destination`, creating it if missing.
    pub fn entry_mut(&mut self, destination: &PeerIdentity) -> &mut RouteEntry {
        let idx = match self.entries.iter().position(|e| e.destination == *destination) {
            Some(idx) => idx,
            None => {
                self.entries.push(RouteEntry::new(destination.clone()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    /// Remove entries whose destination fails `keep`.
    ///
    /// Returns the removed destinations.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<PeerIdentity>
    where
        F: FnMut(&PeerIdentity) -> bool,
    {
        let mut removed = Vec::new();
        self.entries.retain(|e| {
            if keep(&e.destination) {
                true
            } else {
                removed.push(e.destination.clone());
                false
            }
        });
        removed
    }

    /// Iterate over entries in learning order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
