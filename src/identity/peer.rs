//! Peer identity (human-readable display name).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use super::IdentityError;

/// Prefix for generated display names.
const GENERATED_PREFIX: &str = "node-";

/// A peer's identity on the mesh.
///
/// Identities are opaque display names. The only structure the protocol
/// relies on is the lexicographic ordering, which breaks invitation ties
/// between two nodes that discover each other.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Create an identity from a display name.
    ///
    /// Empty or whitespace-only names are rejected.
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(Self(name))
    }

    /// Generate a random identity of the form `node-xxxx`.
    pub fn generate() -> Self {
        let suffix: u16 = rand::thread_rng().gen();
        Self(format!("{}{:04x}", GENERATED_PREFIX, suffix))
    }

    /// Return the display name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identity, returning the display name.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerIdentity({:?})", self.0)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PeerIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PeerIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<PeerIdentity> for String {
    fn from(id: PeerIdentity) -> Self {
        id.0
    }
}

impl TryFrom<&str> for PeerIdentity {
    type Error = IdentityError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<String> for PeerIdentity {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}
