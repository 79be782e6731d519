//! Data and Ack routing.
//!
//! Messages addressed to this node are delivered locally. Anything else is
//! relayed through the first other link whose neighbor announced the
//! destination, or dropped when no such link exists. There is no hop limit:
//! the topology is loop-free, so relays never revisit a node.

use crate::node::{Node, NodeError, NodeEvent};
use crate::protocol::Message;
use crate::transport::Transport;
use crate::PeerIdentity;
use tracing::{debug, info, warn};

impl<T: Transport> Node<T> {
    /// Send a text message to any reachable node.
    ///
    /// Starts an RTT measurement for `destination` once the first hop has
    /// accepted the message.
    pub fn send_to(
        &mut self,
        destination: &PeerIdentity,
        body: impl Into<String>,
        now_ms: u64,
    ) -> Result<(), NodeError> {
        let next_hop = self
            .next_hop(destination, None)
            .cloned()
            .ok_or_else(|| NodeError::UnroutableDestination(destination.clone()))?;

        let message = Message::data(body, self.identity.clone(), destination.clone());
        self.send_message(&next_hop, &message)?;
        self.rtt.record_send(destination.clone(), now_ms);

        debug!(dest = %destination, via = %next_hop, "Sent data message");
        Ok(())
    }

    /// Handle a Data message arriving from neighbor `from`.
    pub(in crate::node) fn handle_data(
        &mut self,
        from: &PeerIdentity,
        body: String,
        sender: PeerIdentity,
        destination: PeerIdentity,
        now_ms: u64,
    ) {
        if destination != self.identity {
            let message = Message::Data {
                body,
                sender,
                destination,
            };
            self.relay(from, &message);
            return;
        }

        info!(from = %sender, via = %from, bytes = body.len(), "Message delivered");
        self.routes.entry_mut(&sender).last_message = body.clone();
        self.emit(NodeEvent::MessageDelivered {
            from: sender.clone(),
            body,
        });
        self.emit(NodeEvent::StateChanged);

        // The Ack retraces the arrival link, then follows the tables.
        let ack = Message::ack(now_ms, self.identity.clone(), sender);
        if let Err(e) = self.send_message(from, &ack) {
            warn!(peer = %from, error = %e, "Failed to send ack");
        }
    }

    /// Handle an Ack arriving from neighbor `from`.
    pub(in crate::node) fn handle_ack(
        &mut self,
        from: &PeerIdentity,
        sent_at_ms: u64,
        sender: PeerIdentity,
        destination: PeerIdentity,
        mut forward_path: Vec<PeerIdentity>,
        now_ms: u64,
    ) {
        if destination != self.identity {
            forward_path.push(self.identity.clone());
            let message = Message::Ack {
                sent_at_ms,
                sender,
                destination,
                forward_path,
            };
            self.relay(from, &message);
            return;
        }

        let Some(rtt) = self.rtt.complete(&sender, now_ms) else {
            debug!(from = %sender, "Ack without outstanding measurement");
            return;
        };

        info!(
            from = %sender,
            rtt_ms = rtt.as_millis() as u64,
            hops = forward_path.len() + 1,
            "Ack received"
        );
        self.routes.entry_mut(&sender).rtt = Some(rtt);
        self.emit(NodeEvent::AckReceived {
            from: sender,
            rtt,
            forward_path,
        });
        self.emit(NodeEvent::StateChanged);
    }

    /// Relay a message not addressed to us, never back through `from`.
    fn relay(&mut self, from: &PeerIdentity, message: &Message) {
        let Some(dest) = message.destination() else {
            return;
        };
        let Some(next_hop) = self.next_hop(dest, Some(from)).cloned() else {
            debug!(dest = %dest, from = %from, kind = %message.kind(), "No route, dropping");
            return;
        };

        match self.send_message(&next_hop, message) {
            Ok(()) => {
                debug!(dest = %dest, via = %next_hop, kind = %message.kind(), "Relayed message")
            }
            Err(e) => {
                debug!(dest = %dest, via = %next_hop, error = %e, "Relay failed, dropping")
            }
        }
    }
}
