//! Periodic housekeeping: stuck negotiations and discovered-peer retry.

use crate::node::{Node, NodeEvent};
use crate::transport::Transport;
use crate::PeerIdentity;
use tracing::{debug, warn};

impl<T: Transport> Node<T> {
    /// Run the periodic housekeeping.
    ///
    /// Called by the event loop on every tick.
    pub fn on_tick(&mut self, now_ms: u64) {
        self.check_timeouts(now_ms);
        self.retry_discovered(now_ms);
    }

    /// Tear down a negotiation that has held the connecting flag too long.
    ///
    /// Without this a neighbor that never sends routing information would
    /// block every future link.
    pub fn check_timeouts(&mut self, now_ms: u64) {
        let Some(pending) = &self.connecting else {
            return;
        };
        let idle_ms = now_ms.saturating_sub(pending.since_ms);
        if idle_ms < self.config.node.connect.handshake_timeout_ms() {
            return;
        }

        let peer = pending.peer.clone();
        warn!(peer = %peer, idle_secs = idle_ms / 1000, "Link negotiation timed out");
        self.connecting = None;

        if self.remove_link(&peer).is_some() {
            if let Err(e) = self.transport.disconnect(&peer) {
                debug!(peer = %peer, error = %e, "Disconnect of timed out link failed");
            }
        }
        self.emit(NodeEvent::StateChanged);
    }

    /// Re-run outbound arbitration for peers that are in range but unlinked.
    ///
    /// At most one invitation goes out per call, since sending it takes the
    /// connecting flag. Candidates are walked starting after the last peer
    /// invited, so a peer that keeps declining cannot starve the others.
    pub fn retry_discovered(&mut self, now_ms: u64) {
        if self.connecting.is_some() || self.links.len() >= self.max_links() {
            return;
        }

        let mut candidates: Vec<PeerIdentity> = self
            .discovered
            .iter()
            .filter(|peer| !self.links.contains_key(*peer))
            .cloned()
            .collect();
        if let Some(last) = &self.last_invited {
            let split = candidates.partition_point(|peer| peer <= last);
            candidates.rotate_left(split);
        }

        for peer in candidates {
            if self.try_invite(&peer, now_ms) {
                break;
            }
        }
    }
}
