//! Chainmesh Protocol Messages
//!
//! Wire format for everything exchanged between two linked nodes. There is a
//! single layer: every message travels hop-by-hop over one link, and
//! multi-hop delivery is achieved by intermediate nodes re-sending Data and
//! Ack messages toward their destination.
//!
//! ## Message kinds
//!
//! | Kind            | Purpose                                             |
//! |-----------------|-----------------------------------------------------|
//! | `data`          | Text body addressed to a destination identity       |
//! | `route_update`  | Reachability gossip, no reply expected              |
//! | `route_request` | Reachability gossip that asks for a reply           |
//! | `route_refresh` | Full view for one link, withdraws what it omits     |
//! | `ack`           | Delivery acknowledgment travelling back to sender   |
//!
//! Messages are encoded as self-describing JSON objects tagged by `kind`.
//! The transport is responsible for framing, so the codec never sees partial
//! messages.

mod error;
mod message;

pub use error::ProtocolError;
pub use message::{Message, MessageKind};
