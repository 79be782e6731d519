//! Peer discovery and invitation handlers.
//!
//! Both paths run the arbitrator. When it approves, the node creates the
//! link, takes the connecting flag and asks the transport to invite or
//! accept. When the transport refuses, the link and the flag are rolled
//! back so the node is free to try another peer.

use crate::link::Link;
use crate::node::{Decision, Node, NodeEvent, PendingConnect};
use crate::transport::{LinkDirection, Transport};
use crate::PeerIdentity;
use tracing::{debug, info, warn};

impl<T: Transport> Node<T> {
    /// Handle a peer coming into range.
    pub(in crate::node) fn handle_peer_discovered(&mut self, peer: PeerIdentity, now_ms: u64) {
        if peer == self.identity {
            return;
        }
        if self.discovered.insert(peer.clone()) {
            debug!(peer = %peer, "Peer discovered");
        }
        self.try_invite(&peer, now_ms);
    }

    /// Invite `peer` if the arbitrator allows it.
    ///
    /// Returns true if an invitation was sent.
    pub(in crate::node) fn try_invite(&mut self, peer: &PeerIdentity, now_ms: u64) -> bool {
        match self.arbitrate(peer, LinkDirection::Outbound) {
            Decision::Accept => {}
            Decision::Reject(reason) => {
                debug!(peer = %peer, reason = %reason, "Not inviting peer");
                return false;
            }
        }

        self.begin_link(Link::outbound(peer.clone(), now_ms), now_ms);
        let timeout = self.config.node.connect.invite_timeout();
        match self.transport.invite(peer, timeout) {
            Ok(()) => {
                info!(peer = %peer, timeout_secs = timeout.as_secs(), "Invited peer");
                self.last_invited = Some(peer.clone());
                self.emit(NodeEvent::StateChanged);
                true
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Invitation failed");
                self.abandon_link(peer);
                false
            }
        }
    }

    /// Handle an invitation from a nearby peer.
    pub(in crate::node) fn handle_invitation(&mut self, peer: PeerIdentity, now_ms: u64) {
        match self.arbitrate(&peer, LinkDirection::Inbound) {
            Decision::Accept => {}
            Decision::Reject(reason) => {
                debug!(peer = %peer, reason = %reason, "Declining invitation");
                if let Err(e) = self.transport.respond_to_invitation(&peer, false) {
                    debug!(peer = %peer, error = %e, "Failed to decline invitation");
                }
                return;
            }
        }

        self.begin_link(Link::inbound(peer.clone(), now_ms), now_ms);
        match self.transport.respond_to_invitation(&peer, true) {
            Ok(()) => {
                info!(peer = %peer, "Accepted invitation");
                self.emit(NodeEvent::StateChanged);
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to accept invitation");
                self.abandon_link(&peer);
            }
        }
    }

    /// Register a new link and take the connecting flag for it.
    fn begin_link(&mut self, link: Link, now_ms: u64) {
        let peer = link.peer().clone();
        self.links.insert(peer.clone(), link);
        self.connecting = Some(PendingConnect {
            peer,
            since_ms: now_ms,
        });
    }

    /// Roll back a link whose negotiation never got off the ground.
    fn abandon_link(&mut self, peer: &PeerIdentity) {
        self.links.remove(peer);
        self.release_connecting_for(peer);
    }
}
