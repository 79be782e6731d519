//! Neighbor Links
//!
//! A [`Link`] is the node's view of one physical neighbor: the session
//! state the transport reports for it, which side sent the invitation, and
//! the set of identities the neighbor has announced as reachable through
//! it. Session state changes come only from the transport; the routing
//! protocol only reads it.

mod stats;

pub use stats::LinkStats;

use crate::transport::{LinkDirection, LinkState};
use crate::PeerIdentity;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Errors related to link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid transition for {peer}: {from} -> {to}")]
    InvalidTransition {
        peer: PeerIdentity,
        from: LinkState,
        to: LinkState,
    },
}

/// A session with one neighbor.
#[derive(Clone, Debug)]
pub struct Link {
    /// The neighbor at the other end.
    peer: PeerIdentity,
    /// Whether we invited them or accepted their invitation.
    direction: LinkDirection,
    /// Session state, as last reported by the transport.
    state: LinkState,
    /// Identities announced as reachable through this neighbor.
    reachable: BTreeSet<PeerIdentity>,
    /// Traffic counters.
    stats: LinkStats,
    /// When this link was created (Unix milliseconds).
    created_at: u64,
}

impl Link {
    /// Create a link in `NotConnected` state.
    pub fn new(peer: PeerIdentity, direction: LinkDirection, created_at: u64) -> Self {
        Self {
            peer,
            direction,
            state: LinkState::NotConnected,
            reachable: BTreeSet::new(),
            stats: LinkStats::new(),
            created_at,
        }
    }

    /// Create a link for an invitation we sent.
    pub fn outbound(peer: PeerIdentity, created_at: u64) -> Self {
        Self::new(peer, LinkDirection::Outbound, created_at)
    }

    /// Create a link for an invitation we accepted.
    pub fn inbound(peer: PeerIdentity, created_at: u64) -> Self {
        Self::new(peer, LinkDirection::Inbound, created_at)
    }

    /// Get the neighbor identity.
    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Get the link direction.
    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    /// True if the remote side invited us.
    ///
    /// The accepting side opens the routing exchange once connected.
    pub fn accepted_incoming_invite(&self) -> bool {
        self.direction == LinkDirection::Inbound
    }

    /// Get the current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Check if this link can carry traffic.
    pub fn is_operational(&self) -> bool {
        self.state.is_operational()
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Apply a state change reported by the transport.
    ///
    /// Returns the previous state.
    pub fn set_state(&mut self, next: LinkState) -> Result<LinkState, LinkError> {
        if !self.state.can_transition_to(next) {
            return Err(LinkError::InvalidTransition {
                peer: self.peer.clone(),
                from: self.state,
                to: next,
            });
        }
        let prev = self.state;
        self.state = next;
        Ok(prev)
    }

    /// Identities announced as reachable through this link.
    pub fn reachable(&self) -> &BTreeSet<PeerIdentity> {
        &self.reachable
    }

    /// Check if `dest` is reachable through this link.
    pub fn routes_to(&self, dest: &PeerIdentity) -> bool {
        self.peer == *dest || self.reachable.contains(dest)
    }

    /// Everything this link contributes to the aggregate routing table.
    pub fn routes(&self) -> impl Iterator<Item = &PeerIdentity> {
        std::iter::once(&self.peer).chain(self.reachable.iter())
    }

    /// Merge announced identities into the reachable set.
    ///
    /// `local` is never added. Returns the entries that were not already
    /// present, in sorted order. Merging the same announcement twice adds
    /// nothing the second time.
    pub fn merge_reachable<'a, I>(&mut self, announced: I, local: &PeerIdentity) -> Vec<PeerIdentity>
    where
        I: IntoIterator<Item = &'a PeerIdentity>,
    {
        let mut added = Vec::new();
        for id in announced {
            if id == local {
                continue;
            }
            if self.reachable.insert(id.clone()) {
                added.push(id.clone());
            }
        }
        added.sort();
        added
    }

    /// Replace the reachable set with a complete announcement.
    ///
    /// `local` is never kept. Returns `(added, withdrawn)`, both sorted.
    pub fn replace_reachable<'a, I>(
        &mut self,
        announced: I,
        local: &PeerIdentity,
    ) -> (Vec<PeerIdentity>, Vec<PeerIdentity>)
    where
        I: IntoIterator<Item = &'a PeerIdentity>,
    {
        let next: BTreeSet<PeerIdentity> = announced
            .into_iter()
            .filter(|id| *id != local)
            .cloned()
            .collect();
        let added = next.difference(&self.reachable).cloned().collect();
        let withdrawn = self.reachable.difference(&next).cloned().collect();
        self.reachable = next;
        (added, withdrawn)
    }

    /// Get the link statistics.
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Get mutable access to link statistics.
    pub fn stats_mut(&mut self) -> &mut LinkStats {
        &mut self.stats
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "link({}, {}, {}, reachable={})",
            self.peer,
            self.direction,
            self.state,
            self.reachable.len()
        )
    }
}
