//! Chainmesh: multi-hop messaging over short-range peer links
//!
//! Each node keeps at most two neighbor links, so the mesh forms a chain.
//! Nodes gossip which identities are reachable through each link and relay
//! text messages and their acknowledgments hop by hop along the chain.

pub mod config;
pub mod identity;
pub mod link;
pub mod node;
pub mod protocol;
pub mod routes;
pub mod rtt;
pub mod transport;

// Re-export identity types
pub use identity::{IdentityError, PeerIdentity};

// Re-export config types
pub use config::{Config, ConfigError, IdentityConfig, NodeConfig};

// Re-export link types
pub use link::{Link, LinkError, LinkStats};

// Re-export transport types
pub use transport::memory::{MemoryHub, MemoryTransport};
pub use transport::{
    event_channel, EventRx, EventTx, LinkDirection, LinkState, Transport, TransportError,
    TransportEvent,
};

// Re-export protocol types
pub use protocol::{Message, MessageKind, ProtocolError};

// Re-export routing types
pub use routes::{RouteEntry, RouteTable};
pub use rtt::RttTracker;

// Re-export node types
pub use node::{
    command_channel, CommandRx, CommandTx, Decision, Node, NodeCommand, NodeError, NodeEvent,
    NodeEventRx, NodeHandle, PendingConnect, RejectReason,
};
