//! Link lifecycle: state changes, peer loss, removal and teardown.

use crate::link::Link;
use crate::node::{Node, NodeEvent};
use crate::protocol::Message;
use crate::transport::{LinkState, Transport};
use crate::PeerIdentity;
use tracing::{debug, info, warn};

impl<T: Transport> Node<T> {
    /// Handle a session state change reported by the transport.
    pub(in crate::node) fn handle_link_state(&mut self, peer: &PeerIdentity, state: LinkState) {
        if state == LinkState::Disconnected {
            if self.remove_link(peer).is_some() {
                info!(peer = %peer, "Link disconnected");
                self.emit(NodeEvent::StateChanged);
            }
            return;
        }

        let Some(link) = self.links.get_mut(peer) else {
            debug!(peer = %peer, state = %state, "State change for unknown link");
            return;
        };
        let direction = link.direction();
        let accepted_invite = link.accepted_incoming_invite();
        match link.set_state(state) {
            Ok(prev) => {
                debug!(peer = %peer, from = %prev, to = %state, "Link state changed");
            }
            Err(e) => {
                debug!(error = %e, "Ignoring link state change");
                return;
            }
        }

        if state == LinkState::Connected {
            info!(peer = %peer, direction = %direction, "Link connected");
            // The side that accepted the invitation opens the route exchange.
            if accepted_invite {
                let reachable = self.announcement_for(peer);
                let request = Message::RouteRequest { reachable };
                if let Err(e) = self.send_message(peer, &request) {
                    warn!(peer = %peer, error = %e, "Failed to send route request");
                }
            }
        }
        self.emit(NodeEvent::StateChanged);
    }

    /// Handle a peer going out of range.
    pub(in crate::node) fn handle_peer_lost(&mut self, peer: &PeerIdentity) {
        self.discovered.remove(peer);
        if !self.links.contains_key(peer) {
            debug!(peer = %peer, "Unlinked peer lost");
            return;
        }

        if let Err(e) = self.transport.disconnect(peer) {
            debug!(peer = %peer, error = %e, "Disconnect after peer loss failed");
        }
        self.remove_link(peer);
        info!(peer = %peer, "Linked peer lost");
        self.emit(NodeEvent::StateChanged);
    }

    /// Remove a link and everything that was only reachable through it.
    ///
    /// Route entries and outstanding RTT measurements for destinations no
    /// longer present in the aggregate routing table are dropped, and the
    /// remaining connected neighbors get a RouteRefresh so they withdraw
    /// them too.
    pub(in crate::node) fn remove_link(&mut self, peer: &PeerIdentity) -> Option<Link> {
        let link = self.links.remove(peer)?;
        self.release_connecting_for(peer);

        let pruned = self.prune_unreachable();
        if pruned > 0 {
            debug!(peer = %peer, pruned, "Pruned unreachable routes");
        }
        self.send_route_refresh(None);
        Some(link)
    }

    /// Drop route entries and RTT records for destinations no link reaches.
    ///
    /// Returns the number of route entries removed.
    pub(in crate::node) fn prune_unreachable(&mut self) -> usize {
        let table = self.routing_table();
        let removed = self.routes.retain(|dest| table.contains(dest));
        for dest in &removed {
            self.rtt.forget(dest);
        }
        removed.len()
    }

    /// Release the connecting flag if `peer` holds it.
    pub(in crate::node) fn release_connecting_for(&mut self, peer: &PeerIdentity) {
        if self.connecting.as_ref().is_some_and(|p| &p.peer == peer) {
            self.connecting = None;
        }
    }

    /// Drop every link and all learned state.
    ///
    /// Used when the host stops participating in the mesh (for example when
    /// the application is backgrounded). The node can rejoin afterwards as
    /// peers are rediscovered.
    pub fn teardown(&mut self) {
        let peers: Vec<PeerIdentity> = self.links.keys().cloned().collect();
        for peer in &peers {
            if let Err(e) = self.transport.disconnect(peer) {
                debug!(peer = %peer, error = %e, "Disconnect during teardown failed");
            }
        }

        self.links.clear();
        self.routes.clear();
        self.rtt.clear();
        self.discovered.clear();
        self.last_invited = None;
        self.connecting = None;

        info!(links = peers.len(), "Node torn down");
        self.emit(NodeEvent::StateChanged);
    }
}
