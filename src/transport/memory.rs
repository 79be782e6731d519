//! In-process transport.
//!
//! `MemoryHub` connects any number of nodes living in the same process.
//! Radio range is modelled as an undirected relation that tests and the
//! simulation binary set up explicitly; bringing two nodes into range
//! reports `PeerDiscovered` on both sides, exactly as over-the-air
//! discovery would. Invitations, session state changes and payloads are
//! delivered as [`TransportEvent`]s on each node's event channel.

use super::{EventTx, Transport, TransportError, TransportEvent, LinkState};
use crate::PeerIdentity;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Unordered pair key for symmetric relations.
type PairKey = (PeerIdentity, PeerIdentity);

fn pair(a: &PeerIdentity, b: &PeerIdentity) -> PairKey {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[derive(Default)]
struct HubState {
    /// Registered nodes and their event channels.
    nodes: HashMap<PeerIdentity, EventTx>,
    /// Pairs that can hear each other.
    in_range: HashSet<PairKey>,
    /// Outstanding invitations, keyed (inviter, invitee).
    invitations: HashSet<(PeerIdentity, PeerIdentity)>,
    /// Established sessions.
    sessions: HashSet<PairKey>,
}

impl HubState {
    fn deliver(&self, to: &PeerIdentity, event: TransportEvent) -> Result<(), TransportError> {
        let tx = self
            .nodes
            .get(to)
            .ok_or_else(|| TransportError::UnknownPeer(to.clone()))?;
        tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::SendFailed(format!("event queue of {} full", to)),
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Best-effort delivery for notifications whose loss only affects the receiver.
    fn notify(&self, to: &PeerIdentity, event: TransportEvent) {
        if let Err(e) = self.deliver(to, event) {
            debug!(to = %to, error = %e, "Dropped transport notification");
        }
    }
}

/// Shared in-process medium. Cloning yields another handle to the same hub.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HubState>, TransportError> {
        self.state.lock().map_err(|_| TransportError::Closed)
    }

    /// Register a node and return its transport handle.
    ///
    /// Events for `local` are delivered on `event_tx`.
    pub fn register(&self, local: PeerIdentity, event_tx: EventTx) -> Result<MemoryTransport, TransportError> {
        let mut state = self.lock()?;
        state.nodes.insert(local.clone(), event_tx);
        Ok(MemoryTransport {
            local,
            hub: self.clone(),
        })
    }

    /// Put two nodes in range of each other, reporting discovery on both sides.
    pub fn connect_range(&self, a: &PeerIdentity, b: &PeerIdentity) -> Result<(), TransportError> {
        let mut state = self.lock()?;
        if !state.nodes.contains_key(a) {
            return Err(TransportError::UnknownPeer(a.clone()));
        }
        if !state.nodes.contains_key(b) {
            return Err(TransportError::UnknownPeer(b.clone()));
        }
        if state.in_range.insert(pair(a, b)) {
            state.notify(a, TransportEvent::PeerDiscovered(b.clone()));
            state.notify(b, TransportEvent::PeerDiscovered(a.clone()));
        }
        Ok(())
    }

    /// Take two nodes out of range, reporting loss on both sides.
    ///
    /// Any session between them is torn down.
    pub fn break_range(&self, a: &PeerIdentity, b: &PeerIdentity) -> Result<(), TransportError> {
        let mut state = self.lock()?;
        let key = pair(a, b);
        if !state.in_range.remove(&key) {
            return Ok(());
        }
        state.invitations.remove(&(a.clone(), b.clone()));
        state.invitations.remove(&(b.clone(), a.clone()));
        let had_session = state.sessions.remove(&key);
        for (local, remote) in [(a, b), (b, a)] {
            state.notify(local, TransportEvent::PeerLost(remote.clone()));
            if had_session {
                state.notify(
                    local,
                    TransportEvent::LinkStateChanged {
                        peer: remote.clone(),
                        state: LinkState::Disconnected,
                    },
                );
            }
        }
        Ok(())
    }

    /// Check whether two nodes have an established session.
    pub fn has_session(&self, a: &PeerIdentity, b: &PeerIdentity) -> bool {
        self.lock()
            .map(|state| state.sessions.contains(&pair(a, b)))
            .unwrap_or(false)
    }

    /// Number of established sessions across the hub.
    pub fn session_count(&self) -> usize {
        self.lock().map(|state| state.sessions.len()).unwrap_or(0)
    }
}

/// A node's handle onto a [`MemoryHub`].
#[derive(Clone)]
pub struct MemoryTransport {
    local: PeerIdentity,
    hub: MemoryHub,
}

impl MemoryTransport {
    /// The identity this handle sends as.
    pub fn local(&self) -> &PeerIdentity {
        &self.local
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, peer: &PeerIdentity, payload: Vec<u8>) -> Result<(), TransportError> {
        let state = self.hub.lock()?;
        if !state.sessions.contains(&pair(&self.local, peer)) {
            return Err(TransportError::NotConnected(peer.clone()));
        }
        trace!(from = %self.local, to = %peer, len = payload.len(), "Memory send");
        state.deliver(
            peer,
            TransportEvent::Received {
                peer: self.local.clone(),
                payload,
            },
        )
    }

    fn invite(&mut self, peer: &PeerIdentity, _timeout: Duration) -> Result<(), TransportError> {
        let mut state = self.hub.lock()?;
        if !state.in_range.contains(&pair(&self.local, peer)) {
            return Err(TransportError::UnknownPeer(peer.clone()));
        }
        state.deliver(peer, TransportEvent::InvitationReceived(self.local.clone()))?;
        state
            .invitations
            .insert((self.local.clone(), peer.clone()));
        state.notify(
            &self.local,
            TransportEvent::LinkStateChanged {
                peer: peer.clone(),
                state: LinkState::Connecting,
            },
        );
        Ok(())
    }

    fn respond_to_invitation(
        &mut self,
        peer: &PeerIdentity,
        accept: bool,
    ) -> Result<(), TransportError> {
        let mut state = self.hub.lock()?;
        if !state.invitations.remove(&(peer.clone(), self.local.clone())) {
            return Err(TransportError::NoInvitation(peer.clone()));
        }

        if !accept {
            state.notify(
                peer,
                TransportEvent::LinkStateChanged {
                    peer: self.local.clone(),
                    state: LinkState::Disconnected,
                },
            );
            return Ok(());
        }

        state.sessions.insert(pair(&self.local, peer));
        state.notify(
            peer,
            TransportEvent::LinkStateChanged {
                peer: self.local.clone(),
                state: LinkState::Connected,
            },
        );
        for link_state in [LinkState::Connecting, LinkState::Connected] {
            state.notify(
                &self.local,
                TransportEvent::LinkStateChanged {
                    peer: peer.clone(),
                    state: link_state,
                },
            );
        }
        Ok(())
    }

    fn disconnect(&mut self, peer: &PeerIdentity) -> Result<(), TransportError> {
        let mut state = self.hub.lock()?;
        state.invitations.remove(&(self.local.clone(), peer.clone()));
        state.invitations.remove(&(peer.clone(), self.local.clone()));
        if !state.sessions.remove(&pair(&self.local, peer)) {
            return Ok(());
        }
        for (local, remote) in [(&self.local, peer), (peer, &self.local)] {
            state.notify(
                local,
                TransportEvent::LinkStateChanged {
                    peer: remote.clone(),
                    state: LinkState::Disconnected,
                },
            );
        }
        Ok(())
    }
}
