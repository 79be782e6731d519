//! Chainmesh Node Entity
//!
//! Top-level structure representing one device on the mesh. The Node owns
//! the local identity, the (at most two) neighbor links with their
//! reachable sets, the route entries shown to the presentation layer and
//! the outstanding RTT measurements. All of it is mutated only from the
//! handlers in `handlers/`, which the event loop calls one event at a time.

mod arbitrator;
mod event_loop;
mod handlers;
#[cfg(test)]
mod tests;

pub use arbitrator::{should_accept, should_invite, Decision, RejectReason};
pub use event_loop::{command_channel, CommandRx, CommandTx, NodeCommand, NodeHandle};

use crate::config::ConfigError;
use crate::link::{Link, LinkError};
use crate::protocol::{Message, ProtocolError};
use crate::routes::{RouteEntry, RouteTable};
use crate::rtt::RttTracker;
use crate::transport::{Transport, TransportError};
use crate::{Config, PeerIdentity};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Errors related to node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("no route to {0}")]
    UnroutableDestination(PeerIdentity),

    #[error("link not found: {0}")]
    LinkNotFound(PeerIdentity),

    #[error("send to {peer} failed: {source}")]
    SendFailed {
        peer: PeerIdentity,
        #[source]
        source: TransportError,
    },

    #[error("node not running")]
    NotRunning,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Domain events published to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// Links or route entries changed; re-read the route list.
    StateChanged,
    /// A Data message addressed to this node arrived.
    MessageDelivered { from: PeerIdentity, body: String },
    /// An Ack for one of our Data messages came back.
    AckReceived {
        from: PeerIdentity,
        rtt: Duration,
        forward_path: Vec<PeerIdentity>,
    },
}

/// Receiver half of a node event subscription.
pub type NodeEventRx = UnboundedReceiver<NodeEvent>;

/// The link negotiation currently holding the node-wide connecting flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingConnect {
    /// Peer being negotiated with.
    pub peer: PeerIdentity,
    /// When the flag was taken (Unix milliseconds).
    pub since_ms: u64,
}

/// A chainmesh node instance.
///
/// ## Link Lifecycle
///
/// Links are created by the arbitrator when it accepts an invitation or
/// sends one, advance as the transport reports state changes, and are
/// removed when the transport reports them disconnected or the peer lost.
/// While any negotiation is in flight the node holds a single connecting
/// flag, and no other link may be started until the new neighbor has
/// exchanged routing information with us.
pub struct Node<T: Transport> {
    // === Identity ===
    /// This node's identity.
    identity: PeerIdentity,

    // === Configuration ===
    /// Loaded configuration.
    config: Config,

    // === Transport ===
    /// Platform transport used for all outbound actions.
    transport: T,

    // === Links ===
    /// Neighbor links keyed by peer.
    links: BTreeMap<PeerIdentity, Link>,
    /// Node-wide connecting flag.
    connecting: Option<PendingConnect>,
    /// Peers the transport has reported in range.
    discovered: BTreeSet<PeerIdentity>,
    /// Most recent peer we sent an invitation to; discovered-peer retry
    /// resumes after it.
    last_invited: Option<PeerIdentity>,

    // === Presentation ===
    /// Route entries for the presentation layer.
    routes: RouteTable,
    /// Event subscribers.
    subscribers: Vec<UnboundedSender<NodeEvent>>,

    // === Measurement ===
    /// Outstanding RTT measurements.
    rtt: RttTracker,
}

impl<T: Transport> Node<T> {
    /// Create a new node from configuration.
    pub fn new(config: Config, transport: T) -> Result<Self, NodeError> {
        let identity = config.create_identity()?;
        Ok(Self::with_identity(identity, config, transport))
    }

    /// Create a node with a specific identity.
    pub fn with_identity(identity: PeerIdentity, config: Config, transport: T) -> Self {
        Self {
            identity,
            config,
            transport,
            links: BTreeMap::new(),
            connecting: None,
            discovered: BTreeSet::new(),
            last_invited: None,
            routes: RouteTable::new(),
            subscribers: Vec::new(),
            rtt: RttTracker::new(),
        }
    }

    // === Identity Accessors ===

    /// Get this node's identity.
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    // === Configuration ===

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Maximum number of simultaneous links.
    pub fn max_links(&self) -> usize {
        self.config.node.limits.max_links
    }

    // === Transport ===

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // === Links ===

    /// Get the link to a neighbor.
    pub fn link(&self, peer: &PeerIdentity) -> Option<&Link> {
        self.links.get(peer)
    }

    /// Iterate over all links in peer order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Number of links (any state).
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of links that are connecting or connected.
    pub fn active_link_count(&self) -> usize {
        self.links.values().filter(|l| l.state().is_active()).count()
    }

    /// Check if a link negotiation is in flight.
    pub fn is_connecting(&self) -> bool {
        self.connecting.is_some()
    }

    /// The negotiation holding the connecting flag, if any.
    pub fn pending_connect(&self) -> Option<&PendingConnect> {
        self.connecting.as_ref()
    }

    /// Peers currently reported in range.
    pub fn discovered(&self) -> &BTreeSet<PeerIdentity> {
        &self.discovered
    }

    // === Routing Table ===

    /// The aggregate routing table: every identity reachable through any link.
    pub fn routing_table(&self) -> BTreeSet<PeerIdentity> {
        self.links
            .values()
            .flat_map(|link| link.routes())
            .cloned()
            .collect()
    }

    /// Identities reachable through links other than the one to `exclude`.
    pub fn routing_table_excluding(&self, exclude: &PeerIdentity) -> BTreeSet<PeerIdentity> {
        self.links
            .values()
            .filter(|link| link.peer() != exclude)
            .flat_map(|link| link.routes())
            .cloned()
            .collect()
    }

    /// The reachability set we announce to `to`.
    ///
    /// Everything reachable through our other links, plus ourselves.
    pub fn announcement_for(&self, to: &PeerIdentity) -> BTreeSet<PeerIdentity> {
        let mut reachable = self.routing_table_excluding(to);
        reachable.insert(self.identity.clone());
        reachable
    }

    /// Check whether `peer` is already reachable through some link.
    pub fn is_routable(&self, peer: &PeerIdentity) -> bool {
        self.links.values().any(|link| link.routes_to(peer))
    }

    /// Pick the link that leads to `dest`, skipping the link to `exclude`.
    pub fn next_hop(
        &self,
        dest: &PeerIdentity,
        exclude: Option<&PeerIdentity>,
    ) -> Option<&PeerIdentity> {
        self.links
            .values()
            .filter(|link| Some(link.peer()) != exclude)
            .find(|link| link.routes_to(dest))
            .map(|link| link.peer())
    }

    // === Route Entries ===

    /// Get the route entry table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Snapshot of the route entries in learning order.
    pub fn route_entries(&self) -> Vec<RouteEntry> {
        self.routes.iter().cloned().collect()
    }

    // === RTT ===

    /// Get the RTT tracker.
    pub fn rtt(&self) -> &RttTracker {
        &self.rtt
    }

    // === Events ===

    /// Subscribe to node events.
    pub fn subscribe(&mut self) -> NodeEventRx {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Publish an event to all live subscribers.
    fn emit(&mut self, event: NodeEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // === Sending ===

    /// Encode and send a message to a neighbor.
    fn send_message(&mut self, peer: &PeerIdentity, message: &Message) -> Result<(), NodeError> {
        if !self.links.contains_key(peer) {
            return Err(NodeError::LinkNotFound(peer.clone()));
        }

        let payload = message.encode()?;
        let len = payload.len();
        self.transport
            .send(peer, payload)
            .map_err(|source| NodeError::SendFailed {
                peer: peer.clone(),
                source,
            })?;

        if let Some(link) = self.links.get_mut(peer) {
            link.stats_mut().record_sent(len);
        }
        trace!(peer = %peer, kind = %message.kind(), bytes = len, "Sent message");
        Ok(())
    }
}

impl<T: Transport> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("identity", &self.identity)
            .field("links", &self.link_count())
            .field("connecting", &self.connecting)
            .field("routes", &self.routes.len())
            .finish()
    }
}
