//! The `Message` union and its JSON codec.

use super::ProtocolError;
use crate::PeerIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Message Kind
// ============================================================================

/// Discriminant of a [`Message`], used for logging and dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Data,
    RouteUpdate,
    RouteRequest,
    RouteRefresh,
    Ack,
}

impl MessageKind {
    /// Check if this kind carries reachability gossip.
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            MessageKind::RouteUpdate | MessageKind::RouteRequest | MessageKind::RouteRefresh
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Data => "Data",
            MessageKind::RouteUpdate => "RouteUpdate",
            MessageKind::RouteRequest => "RouteRequest",
            MessageKind::RouteRefresh => "RouteRefresh",
            MessageKind::Ack => "Ack",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A protocol message exchanged between two linked nodes.
///
/// ## Wire Format
///
/// ```json
/// {"kind":"data","body":"hi","sender":"A","destination":"C"}
/// {"kind":"route_update","reachable":["A","B"]}
/// {"kind":"route_request","reachable":[]}
/// {"kind":"route_refresh","reachable":["B"]}
/// {"kind":"ack","sent_at_ms":1700000000000,"sender":"C","destination":"A","forward_path":["B"]}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Text addressed to `destination`, relayed unchanged by intermediate nodes.
    Data {
        body: String,
        sender: PeerIdentity,
        destination: PeerIdentity,
    },

    /// Identities reachable through the sender. No reply is expected.
    RouteUpdate { reachable: BTreeSet<PeerIdentity> },

    /// Same payload as `RouteUpdate`, but the receiver answers with its own view.
    RouteRequest { reachable: BTreeSet<PeerIdentity> },

    /// The sender's complete current view for this link.
    ///
    /// Replaces whatever was announced through the link before; identities
    /// missing from it are withdrawn.
    RouteRefresh { reachable: BTreeSet<PeerIdentity> },

    /// Delivery acknowledgment for a Data message.
    ///
    /// `sender` is the node that received the Data message; `destination`
    /// is the node that originated it. Each relay appends its own identity
    /// to `forward_path`.
    Ack {
        sent_at_ms: u64,
        sender: PeerIdentity,
        destination: PeerIdentity,
        #[serde(default)]
        forward_path: Vec<PeerIdentity>,
    },
}

impl Message {
    /// Create a Data message.
    pub fn data(body: impl Into<String>, sender: PeerIdentity, destination: PeerIdentity) -> Self {
        Message::Data {
            body: body.into(),
            sender,
            destination,
        }
    }

    /// Create an Ack with an empty forward path.
    pub fn ack(sent_at_ms: u64, sender: PeerIdentity, destination: PeerIdentity) -> Self {
        Message::Ack {
            sent_at_ms,
            sender,
            destination,
            forward_path: Vec::new(),
        }
    }

    /// Get the message kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Data { .. } => MessageKind::Data,
            Message::RouteUpdate { .. } => MessageKind::RouteUpdate,
            Message::RouteRequest { .. } => MessageKind::RouteRequest,
            Message::RouteRefresh { .. } => MessageKind::RouteRefresh,
            Message::Ack { .. } => MessageKind::Ack,
        }
    }

    /// Destination identity for Data and Ack messages.
    pub fn destination(&self) -> Option<&PeerIdentity> {
        match self {
            Message::Data { destination, .. } | Message::Ack { destination, .. } => {
                Some(destination)
            }
            Message::RouteUpdate { .. }
            | Message::RouteRequest { .. }
            | Message::RouteRefresh { .. } => None,
        }
    }

    /// Encode to the JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }

    /// Decode from the JSON wire form.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.is_empty() {
            return Err(ProtocolError::Empty);
        }
        serde_json::from_slice(payload).map_err(ProtocolError::Malformed)
    }
}
