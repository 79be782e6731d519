//! Node Identity
//!
//! Nodes are identified by a human-readable display name. The name is the
//! routing key for every protocol message and the tie-breaker that decides
//! which side of a newly discovered pair sends the invitation.

mod peer;

use thiserror::Error;

pub use peer::PeerIdentity;

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity name must not be empty")]
    Empty,
}
