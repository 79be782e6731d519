//! Node event loop and command handle.
//!
//! The loop is the only writer of node state. It multiplexes transport
//! events, commands from the presentation layer and a housekeeping tick,
//! handling each to completion before taking the next.

use crate::node::{Node, NodeError};
use crate::routes::RouteEntry;
use crate::transport::{EventRx, Transport};
use crate::PeerIdentity;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// A request from the presentation layer.
#[derive(Debug)]
pub enum NodeCommand {
    /// Send a text message to a reachable node.
    SendTo {
        destination: PeerIdentity,
        body: String,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
    /// Read the current route entries.
    Routes {
        reply: oneshot::Sender<Vec<RouteEntry>>,
    },
    /// Drop all links and learned state, keep running.
    Teardown,
    /// Stop the event loop.
    Shutdown,
}

/// Channel sender for node commands.
pub type CommandTx = mpsc::Sender<NodeCommand>;

/// Channel receiver for node commands.
pub type CommandRx = mpsc::Receiver<NodeCommand>;

/// Create a command channel with the given buffer size.
///
/// A size of zero is raised to one.
pub fn command_channel(buffer: usize) -> (CommandTx, CommandRx) {
    mpsc::channel(buffer.max(1))
}

/// Current wall clock time in Unix milliseconds.
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl<T: Transport> Node<T> {
    /// Run the event loop.
    ///
    /// Returns when the transport event channel closes or a
    /// [`NodeCommand::Shutdown`] arrives. If every command sender is dropped
    /// the loop keeps serving transport events.
    pub async fn run(&mut self, mut events: EventRx, mut commands: CommandRx) {
        let tick_secs = self.config.node.tick_interval_secs.max(1);
        let mut tick = tokio::time::interval(Duration::from_secs(tick_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut commands_open = true;

        info!(identity = %self.identity, "Event loop started");

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event, now_ms()),
                        None => break, // transport gone
                    }
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(NodeCommand::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Some(command) => self.handle_command(command),
                        None => commands_open = false,
                    }
                }
                _ = tick.tick() => {
                    self.on_tick(now_ms());
                }
            }
        }

        info!(identity = %self.identity, "Event loop stopped");
    }

    /// Apply one command from the presentation layer.
    fn handle_command(&mut self, command: NodeCommand) {
        match command {
            NodeCommand::SendTo {
                destination,
                body,
                reply,
            } => {
                let result = self.send_to(&destination, body, now_ms());
                if let Err(e) = &result {
                    debug!(dest = %destination, error = %e, "Send rejected");
                }
                let _ = reply.send(result);
            }
            NodeCommand::Routes { reply } => {
                let _ = reply.send(self.route_entries());
            }
            NodeCommand::Teardown => self.teardown(),
            NodeCommand::Shutdown => {}
        }
    }
}

/// Cloneable handle for talking to a running node.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    commands: CommandTx,
}

impl NodeHandle {
    /// Wrap a command sender.
    pub fn new(commands: CommandTx) -> Self {
        Self { commands }
    }

    /// Send a text message to a reachable node.
    pub async fn send_to(
        &self,
        destination: PeerIdentity,
        body: impl Into<String>,
    ) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.command(NodeCommand::SendTo {
            destination,
            body: body.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NodeError::NotRunning)?
    }

    /// Read the node's current route entries.
    pub async fn routes(&self) -> Result<Vec<RouteEntry>, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.command(NodeCommand::Routes { reply }).await?;
        rx.await.map_err(|_| NodeError::NotRunning)
    }

    /// Drop all links and learned state.
    pub async fn teardown(&self) -> Result<(), NodeError> {
        self.command(NodeCommand::Teardown).await
    }

    /// Stop the node's event loop.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.command(NodeCommand::Shutdown).await
    }

    async fn command(&self, command: NodeCommand) -> Result<(), NodeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NodeError::NotRunning)
    }
}
