use super::*;
use crate::protocol::Message;
use crate::transport::{LinkDirection, LinkState, TransportEvent};

mod event_loop;
mod forwarding;

/// Simulated per-hop latency applied by [`TestNet::pump`].
pub(super) const HOP_DELAY_MS: u64 = 5;

/// Start of the simulated clock.
pub(super) const T0: u64 = 1_700_000_000_000;

/// An outbound action captured by [`RecordingTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Action {
    Send { to: PeerIdentity, payload: Vec<u8> },
    Invite { to: PeerIdentity },
    Respond { to: PeerIdentity, accept: bool },
    Disconnect { to: PeerIdentity },
}

/// Transport double that records every call instead of performing it.
#[derive(Debug, Default)]
pub(super) struct RecordingTransport {
    pub(super) actions: Vec<Action>,
    pub(super) fail_sends: bool,
    pub(super) fail_invites: bool,
}

impl RecordingTransport {
    pub(super) fn take(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, peer: &PeerIdentity, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::NotConnected(peer.clone()));
        }
        self.actions.push(Action::Send {
            to: peer.clone(),
            payload,
        });
        Ok(())
    }

    fn invite(&mut self, peer: &PeerIdentity, _timeout: Duration) -> Result<(), TransportError> {
        if self.fail_invites {
            return Err(TransportError::UnknownPeer(peer.clone()));
        }
        self.actions.push(Action::Invite { to: peer.clone() });
        Ok(())
    }

    fn respond_to_invitation(
        &mut self,
        peer: &PeerIdentity,
        accept: bool,
    ) -> Result<(), TransportError> {
        self.actions.push(Action::Respond {
            to: peer.clone(),
            accept,
        });
        Ok(())
    }

    fn disconnect(&mut self, peer: &PeerIdentity) -> Result<(), TransportError> {
        self.actions.push(Action::Disconnect { to: peer.clone() });
        Ok(())
    }
}

pub(super) type TestNode = Node<RecordingTransport>;

pub(super) fn id(name: &str) -> PeerIdentity {
    PeerIdentity::new(name).unwrap()
}

pub(super) fn ids(names: &[&str]) -> BTreeSet<PeerIdentity> {
    names.iter().map(|n| id(n)).collect()
}

pub(super) fn make_node(name: &str) -> TestNode {
    Node::with_identity(id(name), Config::new(), RecordingTransport::default())
}

/// Drain the node's recorded actions, keeping only decoded sends.
pub(super) fn take_sent(node: &mut TestNode) -> Vec<(PeerIdentity, Message)> {
    node.transport_mut()
        .take()
        .into_iter()
        .filter_map(|action| match action {
            Action::Send { to, payload } => Some((to, Message::decode(&payload).unwrap())),
            _ => None,
        })
        .collect()
}

/// Feed a message from `from` into `node` as if it arrived over the link.
pub(super) fn receive(node: &mut TestNode, from: &str, message: &Message, now_ms: u64) {
    node.handle_event(
        TransportEvent::Received {
            peer: id(from),
            payload: message.encode().unwrap(),
        },
        now_ms,
    );
}

pub(super) fn set_state(node: &mut TestNode, peer: &str, state: LinkState) {
    node.handle_event(
        TransportEvent::LinkStateChanged {
            peer: id(peer),
            state,
        },
        T0,
    );
}

/// Bring up a Connected link from `node` to `peer` without a second node.
///
/// Follows the tie-break: the smaller identity accepts an invitation, the
/// larger one sends it. The connecting flag is still held afterwards, and
/// recorded actions are discarded.
pub(super) fn open_link(node: &mut TestNode, peer: &str) {
    if node.identity() < &id(peer) {
        node.handle_event(TransportEvent::InvitationReceived(id(peer)), T0);
    } else {
        node.handle_event(TransportEvent::PeerDiscovered(id(peer)), T0);
    }
    assert!(node.link(&id(peer)).is_some(), "arbitrator refused {}", peer);
    set_state(node, peer, LinkState::Connecting);
    set_state(node, peer, LinkState::Connected);
    node.transport_mut().take();
}

/// Bring up a link and complete the route exchange with an announcement
/// of `reachable` from the peer.
pub(super) fn open_link_with(node: &mut TestNode, peer: &str, reachable: &[&str]) {
    open_link(node, peer);
    let update = Message::RouteUpdate {
        reachable: ids(reachable),
    };
    receive(node, peer, &update, T0);
    node.transport_mut().take();
}

/// A set of nodes wired together by replaying each node's recorded
/// transport actions as events on the peer it targets.
pub(super) struct TestNet {
    pub(super) nodes: Vec<TestNode>,
    pub(super) now_ms: u64,
}

impl TestNet {
    pub(super) fn new(names: &[&str]) -> Self {
        Self {
            nodes: names.iter().map(|n| make_node(n)).collect(),
            now_ms: T0,
        }
    }

    /// Build a chain in the given order, one discovery at a time.
    pub(super) fn chain(names: &[&str]) -> Self {
        let mut net = Self::new(names);
        for pair in names.windows(2) {
            net.discover(pair[0], pair[1]);
            net.pump();
        }
        net
    }

    pub(super) fn index(&self, name: &str) -> usize {
        self.nodes
            .iter()
            .position(|n| n.identity().as_str() == name)
            .unwrap_or_else(|| panic!("no node {}", name))
    }

    pub(super) fn node(&self, name: &str) -> &TestNode {
        &self.nodes[self.index(name)]
    }

    pub(super) fn node_mut(&mut self, name: &str) -> &mut TestNode {
        let i = self.index(name);
        &mut self.nodes[i]
    }

    fn deliver(&mut self, to: &PeerIdentity, event: TransportEvent) {
        let now_ms = self.now_ms;
        if let Some(node) = self.nodes.iter_mut().find(|n| n.identity() == to) {
            node.handle_event(event, now_ms);
        }
    }

    /// Report two nodes to each other as in range.
    pub(super) fn discover(&mut self, a: &str, b: &str) {
        self.deliver(&id(a), TransportEvent::PeerDiscovered(id(b)));
        self.deliver(&id(b), TransportEvent::PeerDiscovered(id(a)));
    }

    /// Replay recorded actions until no node has anything left to do.
    ///
    /// Each round advances the clock by [`HOP_DELAY_MS`]. Returns the
    /// number of payloads delivered.
    pub(super) fn pump(&mut self) -> usize {
        let mut delivered = 0;
        for _ in 0..1000 {
            let batch: Vec<(PeerIdentity, Action)> = self
                .nodes
                .iter_mut()
                .flat_map(|n| {
                    let from = n.identity().clone();
                    n.transport_mut()
                        .take()
                        .into_iter()
                        .map(move |a| (from.clone(), a))
                })
                .collect();
            if batch.is_empty() {
                return delivered;
            }
            self.now_ms += HOP_DELAY_MS;

            for (from, action) in batch {
                match action {
                    Action::Send { to, payload } => {
                        delivered += 1;
                        self.deliver(&to, TransportEvent::Received { peer: from, payload });
                    }
                    Action::Invite { to } => {
                        self.deliver(&to, TransportEvent::InvitationReceived(from.clone()));
                        self.deliver(
                            &from,
                            TransportEvent::LinkStateChanged {
                                peer: to,
                                state: LinkState::Connecting,
                            },
                        );
                    }
                    Action::Respond { to, accept: true } => {
                        self.deliver(
                            &to,
                            TransportEvent::LinkStateChanged {
                                peer: from.clone(),
                                state: LinkState::Connected,
                            },
                        );
                        for state in [LinkState::Connecting, LinkState::Connected] {
                            self.deliver(
                                &from,
                                TransportEvent::LinkStateChanged {
                                    peer: to.clone(),
                                    state,
                                },
                            );
                        }
                    }
                    Action::Respond { to, accept: false } => {
                        self.deliver(
                            &to,
                            TransportEvent::LinkStateChanged {
                                peer: from,
                                state: LinkState::Disconnected,
                            },
                        );
                    }
                    Action::Disconnect { to } => {
                        self.deliver(
                            &to,
                            TransportEvent::LinkStateChanged {
                                peer: from,
                                state: LinkState::Disconnected,
                            },
                        );
                    }
                }
            }
        }
        panic!("network did not quiesce");
    }

    /// Route entry destinations of a node, sorted.
    pub(super) fn route_names(&self, name: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .node(name)
            .routes()
            .iter()
            .map(|e| e.destination.as_str().to_string())
            .collect();
        names.sort();
        names
    }
}

/// Drain every event currently queued on a subscription.
pub(super) fn drain_events(rx: &mut NodeEventRx) -> Vec<NodeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
