//! Transport event dispatch.

use crate::node::Node;
use crate::protocol::Message;
use crate::transport::{Transport, TransportEvent};
use crate::PeerIdentity;
use tracing::{debug, trace};

impl<T: Transport> Node<T> {
    /// Handle one event reported by the transport.
    ///
    /// This is the single entry point for transport-driven state changes;
    /// the event loop calls it once per event, in arrival order.
    pub fn handle_event(&mut self, event: TransportEvent, now_ms: u64) {
        match event {
            TransportEvent::PeerDiscovered(peer) => self.handle_peer_discovered(peer, now_ms),
            TransportEvent::PeerLost(peer) => self.handle_peer_lost(&peer),
            TransportEvent::InvitationReceived(peer) => self.handle_invitation(peer, now_ms),
            TransportEvent::LinkStateChanged { peer, state } => {
                self.handle_link_state(&peer, state)
            }
            TransportEvent::Received { peer, payload } => {
                self.handle_payload(&peer, &payload, now_ms)
            }
        }
    }

    /// Decode a payload from a neighbor and route it to its handler.
    fn handle_payload(&mut self, from: &PeerIdentity, payload: &[u8], now_ms: u64) {
        let Some(link) = self.links.get_mut(from) else {
            debug!(peer = %from, bytes = payload.len(), "Payload from unlinked peer, dropping");
            return;
        };

        let message = match Message::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                link.stats_mut().record_decode_error();
                debug!(peer = %from, error = %e, "Malformed message, dropping");
                return;
            }
        };
        link.stats_mut().record_recv(payload.len(), now_ms);
        trace!(peer = %from, kind = %message.kind(), "Received message");

        match message {
            Message::RouteUpdate { reachable } => {
                self.handle_route_message(from, &reachable, false)
            }
            Message::RouteRequest { reachable } => {
                self.handle_route_message(from, &reachable, true)
            }
            Message::RouteRefresh { reachable } => self.handle_route_refresh(from, &reachable),
            Message::Data {
                body,
                sender,
                destination,
            } => self.handle_data(from, body, sender, destination, now_ms),
            Message::Ack {
                sent_at_ms,
                sender,
                destination,
                forward_path,
            } => self.handle_ack(from, sent_at_ms, sender, destination, forward_path, now_ms),
        }
    }
}
