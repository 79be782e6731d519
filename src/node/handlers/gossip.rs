//! Routing table gossip.
//!
//! Each link carries the set of identities its neighbor has announced as
//! reachable. On every RouteUpdate or RouteRequest the node merges the
//! announcement into that link, answers a request with its own view, and
//! floods an update to every other link. The announcement sent to a link
//! never contains what was learned through that same link, and merges are
//! idempotent, so a flood dies out once every node has merged it.
//!
//! Merges only add. When a link goes away the node sends a RouteRefresh,
//! its complete view, to each remaining neighbor, which replaces that
//! link's reachable set and withdraws whatever the refresh leaves out. A
//! neighbor whose view changed passes its own refresh further along.

use crate::node::{Node, NodeEvent};
use crate::protocol::Message;
use crate::transport::Transport;
use crate::PeerIdentity;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

impl<T: Transport> Node<T> {
    /// Handle a RouteUpdate (`is_request == false`) or RouteRequest.
    pub(in crate::node) fn handle_route_message(
        &mut self,
        from: &PeerIdentity,
        reachable: &BTreeSet<PeerIdentity>,
        is_request: bool,
    ) {
        self.release_connecting_on_route(from);

        let Some(link) = self.links.get_mut(from) else {
            debug!(peer = %from, "Route announcement from unlinked peer");
            return;
        };
        let added = link.merge_reachable(reachable, &self.identity);
        let total = link.reachable().len();

        let mut created = 0;
        for dest in std::iter::once(from).chain(added.iter()) {
            if self.routes.ensure(dest) {
                created += 1;
            }
        }
        if !added.is_empty() || created > 0 {
            info!(
                peer = %from,
                added = added.len(),
                reachable = total,
                new_routes = created,
                "Merged route announcement"
            );
        }

        if is_request {
            let reply = Message::RouteUpdate {
                reachable: self.announcement_for(from),
            };
            if let Err(e) = self.send_message(from, &reply) {
                warn!(peer = %from, error = %e, "Failed to answer route request");
            }
        }

        self.broadcast_route_update(from);
        self.emit(NodeEvent::StateChanged);
    }

    /// Handle a RouteRefresh: replace the link's view and withdraw the rest.
    pub(in crate::node) fn handle_route_refresh(
        &mut self,
        from: &PeerIdentity,
        reachable: &BTreeSet<PeerIdentity>,
    ) {
        self.release_connecting_on_route(from);

        let Some(link) = self.links.get_mut(from) else {
            debug!(peer = %from, "Route refresh from unlinked peer");
            return;
        };
        let (added, withdrawn) = link.replace_reachable(reachable, &self.identity);
        if added.is_empty() && withdrawn.is_empty() {
            return;
        }

        for dest in std::iter::once(from).chain(added.iter()) {
            self.routes.ensure(dest);
        }
        let pruned = self.prune_unreachable();
        info!(
            peer = %from,
            added = added.len(),
            withdrawn = withdrawn.len(),
            pruned,
            "Applied route refresh"
        );

        self.send_route_refresh(Some(from));
        self.emit(NodeEvent::StateChanged);
    }

    /// Send each connected link, except `except`, our complete view for it.
    pub(in crate::node) fn send_route_refresh(&mut self, except: Option<&PeerIdentity>) {
        let targets: Vec<PeerIdentity> = self
            .links
            .values()
            .filter(|link| link.is_operational() && Some(link.peer()) != except)
            .map(|link| link.peer().clone())
            .collect();

        for peer in targets {
            let refresh = Message::RouteRefresh {
                reachable: self.announcement_for(&peer),
            };
            if let Err(e) = self.send_message(&peer, &refresh) {
                debug!(peer = %peer, error = %e, "Failed to send route refresh");
            }
        }
    }

    /// Release the connecting flag after routing traffic from `from`.
    ///
    /// With the default two links any routing exchange completes the pending
    /// negotiation. Above that, only traffic from the peer being negotiated
    /// with does, so a flood over an existing link cannot free the flag
    /// mid-handshake.
    fn release_connecting_on_route(&mut self, from: &PeerIdentity) {
        let Some(pending) = &self.connecting else {
            return;
        };
        if self.max_links() > 2 && &pending.peer != from {
            return;
        }
        debug!(peer = %pending.peer, via = %from, "Connecting flag released");
        self.connecting = None;
    }

    /// Send a RouteUpdate to every link except the one to `except`.
    ///
    /// Each link gets the announcement computed for it, so nothing learned
    /// through a link is reflected back into it.
    pub(in crate::node) fn broadcast_route_update(&mut self, except: &PeerIdentity) {
        let targets: Vec<PeerIdentity> = self
            .links
            .keys()
            .filter(|peer| *peer != except)
            .cloned()
            .collect();

        for peer in targets {
            let update = Message::RouteUpdate {
                reachable: self.announcement_for(&peer),
            };
            if let Err(e) = self.send_message(&peer, &update) {
                debug!(peer = %peer, error = %e, "Failed to flood route update");
            }
        }
    }
}
