//! Topology arbitration.
//!
//! Decides whether a newly discovered peer should be invited and whether an
//! incoming invitation should be accepted. The rules keep the mesh a simple
//! chain: at most `max_links` neighbors, one negotiation at a time, no link
//! to a peer that is already reachable (which would close a cycle), and a
//! lexicographic tie-break so that two peers discovering each other at the
//! same moment open exactly one link between them.

use crate::node::Node;
use crate::transport::{LinkDirection, Transport};
use crate::PeerIdentity;
use std::fmt;

/// Outcome of an arbitration check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead: accept the invitation, or send one.
    Accept,
    /// Leave the peer alone.
    Reject(RejectReason),
}

impl Decision {
    /// Check if the decision is to proceed.
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// Why the arbitrator turned a peer down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Another link negotiation holds the connecting flag.
    Connecting,
    /// The node already has `max_links` links.
    AtCapacity,
    /// The peer is already reachable through an existing link.
    AlreadyReachable,
    /// The other side is responsible for this direction.
    TieBreak,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::Connecting => "connecting",
            RejectReason::AtCapacity => "at_capacity",
            RejectReason::AlreadyReachable => "already_reachable",
            RejectReason::TieBreak => "tie_break",
        };
        write!(f, "{}", s)
    }
}

/// Whether `local` should accept an invitation sent by `remote`.
///
/// Only the lexicographically smaller identity accepts.
pub fn should_accept(local: &PeerIdentity, remote: &PeerIdentity) -> bool {
    local < remote
}

/// Whether `local` should invite a discovered `remote`.
///
/// Only the lexicographically larger identity invites.
pub fn should_invite(local: &PeerIdentity, remote: &PeerIdentity) -> bool {
    local > remote
}

impl<T: Transport> Node<T> {
    /// Evaluate a peer for a new link in the given direction.
    ///
    /// `Inbound` means the peer invited us; `Outbound` means we discovered
    /// it and would send the invitation. Rules are applied in order and the
    /// first failing rule is reported.
    pub fn arbitrate(&self, peer: &PeerIdentity, direction: LinkDirection) -> Decision {
        if self.connecting.is_some() {
            return Decision::Reject(RejectReason::Connecting);
        }
        if self.links.len() >= self.max_links() {
            return Decision::Reject(RejectReason::AtCapacity);
        }
        if self.is_routable(peer) {
            return Decision::Reject(RejectReason::AlreadyReachable);
        }

        let ours = match direction {
            LinkDirection::Inbound => should_accept(&self.identity, peer),
            LinkDirection::Outbound => should_invite(&self.identity, peer),
        };
        if ours {
            Decision::Accept
        } else {
            Decision::Reject(RejectReason::TieBreak)
        }
    }
}
