//! Transport Layer Abstractions
//!
//! Traits and types for the platform transport a node runs on. The
//! transport owns everything below the routing protocol: peer discovery
//! over the air, the invitation handshake, encrypted sessions and reliable
//! delivery of whole payloads. It reports what happens through
//! [`TransportEvent`]s and accepts commands through the [`Transport`] trait.

pub mod memory;

use crate::PeerIdentity;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Event Channel Types
// ============================================================================

/// An event reported by the transport.
///
/// Events for one node are serialized through a single channel, which makes
/// the node's event loop the only writer of protocol state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A nearby peer became visible.
    PeerDiscovered(PeerIdentity),
    /// A previously visible peer is gone.
    PeerLost(PeerIdentity),
    /// A peer invited us to open a link.
    InvitationReceived(PeerIdentity),
    /// The session with a peer changed state.
    LinkStateChanged {
        peer: PeerIdentity,
        state: LinkState,
    },
    /// A complete payload arrived from a linked peer.
    Received {
        peer: PeerIdentity,
        payload: Vec<u8>,
    },
}

impl TransportEvent {
    /// The peer this event concerns.
    pub fn peer(&self) -> &PeerIdentity {
        match self {
            TransportEvent::PeerDiscovered(peer)
            | TransportEvent::PeerLost(peer)
            | TransportEvent::InvitationReceived(peer) => peer,
            TransportEvent::LinkStateChanged { peer, .. } | TransportEvent::Received { peer, .. } => {
                peer
            }
        }
    }
}

/// Channel sender for transport events.
pub type EventTx = tokio::sync::mpsc::Sender<TransportEvent>;

/// Channel receiver for transport events.
pub type EventRx = tokio::sync::mpsc::Receiver<TransportEvent>;

/// Create a transport event channel with the given buffer size.
///
/// A size of zero is raised to one.
pub fn event_channel(buffer: usize) -> (EventTx, EventRx) {
    tokio::sync::mpsc::channel(buffer.max(1))
}

// ============================================================================
// Errors
// ============================================================================

/// Errors related to transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no session with {0}")]
    NotConnected(PeerIdentity),

    #[error("unknown peer: {0}")]
    UnknownPeer(PeerIdentity),

    #[error("no pending invitation from {0}")]
    NoInvitation(PeerIdentity),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport closed")]
    Closed,
}

// ============================================================================
// Link State
// ============================================================================

/// Session lifecycle state as reported by the transport.
///
/// Progresses `NotConnected -> Connecting -> Connected -> Disconnected`.
/// `Disconnected` is terminal: a link that reaches it is discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// Created, no session yet.
    NotConnected,
    /// Session negotiation in progress.
    Connecting,
    /// Ready for traffic.
    Connected,
    /// Was connected or connecting, now gone.
    Disconnected,
}

impl LinkState {
    /// Check if the link can carry traffic.
    pub fn is_operational(&self) -> bool {
        matches!(self, LinkState::Connected)
    }

    /// Check if the link occupies a capacity slot.
    pub fn is_active(&self) -> bool {
        matches!(self, LinkState::Connecting | LinkState::Connected)
    }

    /// Check if the link is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Disconnected)
    }

    /// Check whether moving from `self` to `next` follows the lifecycle.
    ///
    /// Any non-terminal state may drop to `Disconnected`; otherwise states
    /// only move forward.
    pub fn can_transition_to(&self, next: LinkState) -> bool {
        use LinkState::*;
        match (self, next) {
            (Disconnected, _) => false,
            (_, Disconnected) => true,
            (NotConnected, Connecting) | (NotConnected, Connected) => true,
            (Connecting, Connected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::NotConnected => "not_connected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Disconnected => "disconnected",
        };
        write!(f, "{}", s)
    }
}

/// Direction of link establishment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkDirection {
    /// We sent the invitation.
    Outbound,
    /// They sent the invitation and we accepted.
    Inbound,
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkDirection::Outbound => "outbound",
            LinkDirection::Inbound => "inbound",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Commands the node issues to its transport.
///
/// All operations are non-blocking. `send` hands the payload to the
/// transport's own reliable queue; a returned error means the payload was
/// not accepted, and the node never retries it.
pub trait Transport {
    /// Queue a payload for delivery to a linked peer.
    fn send(&mut self, peer: &PeerIdentity, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Invite a discovered peer to open a link.
    fn invite(&mut self, peer: &PeerIdentity, timeout: Duration) -> Result<(), TransportError>;

    /// Answer an invitation previously reported by `InvitationReceived`.
    fn respond_to_invitation(
        &mut self,
        peer: &PeerIdentity,
        accept: bool,
    ) -> Result<(), TransportError>;

    /// Close the session with a peer.
    fn disconnect(&mut self, peer: &PeerIdentity) -> Result<(), TransportError>;
}

// ============================================================================
// Tests
// ============================================================================
