//! Chainmesh simulation daemon
//!
//! Runs a chain of nodes over the in-process transport, waits for routing
//! to converge, then sends a message from the first node to the last and
//! reports the acknowledgment.

use chainmesh::{
    command_channel, event_channel, Config, MemoryHub, Node, NodeEvent, NodeEventRx, NodeHandle,
    PeerIdentity,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Chainmesh chain simulator
#[derive(Parser, Debug)]
#[command(name = "chainmesh", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Node names, in chain order
    #[arg(short, long, value_delimiter = ',', default_value = "alpha,bravo,charlie,delta")]
    nodes: Vec<String>,

    /// Text sent from the first node to the last
    #[arg(short, long, default_value = "hello from the far end")]
    message: String,

    /// Seconds to wait for routing to converge
    #[arg(long, default_value_t = 30)]
    converge_secs: u64,

    /// Keep running after the exchange until Ctrl+C
    #[arg(long)]
    stay: bool,
}

struct SimNode {
    identity: PeerIdentity,
    handle: NodeHandle,
    events: NodeEventRx,
    task: JoinHandle<()>,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    info!("Chainmesh starting");

    // Load configuration
    let (config, loaded_paths) = if let Some(config_path) = &args.config {
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }
    if config.has_identity() {
        warn!("Configured identity ignored, simulated nodes use --nodes names");
    }

    if args.nodes.len() < 2 {
        error!("At least two nodes are needed for a chain");
        std::process::exit(1);
    }

    let hub = MemoryHub::new();
    let mut nodes = Vec::with_capacity(args.nodes.len());
    for name in &args.nodes {
        match spawn_node(&hub, &config, name) {
            Ok(node) => nodes.push(node),
            Err(e) => {
                error!(name = %name, "Failed to create node: {}", e);
                std::process::exit(1);
            }
        }
    }
    info!(nodes = nodes.len(), "Nodes running");

    for pair in nodes.windows(2) {
        if let Err(e) = hub.connect_range(&pair[0].identity, &pair[1].identity) {
            error!("Failed to place nodes in range: {}", e);
            std::process::exit(1);
        }
    }

    tokio::select! {
        result = exchange(&mut nodes, &args) => {
            if let Err(e) = result {
                error!("{}", e);
            }
            if args.stay {
                info!("Chainmesh running, press Ctrl+C to exit");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
            }
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    info!("Chainmesh shutting down");
    for node in nodes {
        if let Err(e) = node.handle.shutdown().await {
            warn!(node = %node.identity, "Error during shutdown: {}", e);
        }
        if let Err(e) = node.task.await {
            warn!(node = %node.identity, "Node task failed: {}", e);
        }
    }
    info!("Chainmesh shutdown complete");
}

fn spawn_node(hub: &MemoryHub, base: &Config, name: &str) -> Result<SimNode, chainmesh::NodeError> {
    let mut config = base.clone();
    config.node.identity.name = Some(name.to_string());

    let (event_tx, event_rx) = event_channel(config.node.buffers.event_channel);
    let (command_tx, command_rx) = command_channel(config.node.buffers.command_channel);
    let identity = config.create_identity()?;
    let transport = hub.register(identity.clone(), event_tx)?;

    let mut node = Node::new(config, transport)?;
    let events = node.subscribe();
    let task = tokio::spawn(async move { node.run(event_rx, command_rx).await });

    Ok(SimNode {
        identity,
        handle: NodeHandle::new(command_tx),
        events,
        task,
    })
}

/// Wait for convergence, then send the message end to end.
async fn exchange(nodes: &mut [SimNode], args: &Args) -> Result<(), String> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.converge_secs);
    for node in nodes.iter() {
        let expected = nodes.len() - 1;
        loop {
            let routes = node.handle.routes().await.map_err(|e| e.to_string())?;
            if routes.len() >= expected {
                let names: Vec<&str> = routes.iter().map(|r| r.destination.as_str()).collect();
                info!(node = %node.identity, routes = ?names, "Routing converged");
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(format!("{} did not converge", node.identity));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    let (first, rest) = nodes.split_first_mut().ok_or("no nodes")?;
    let last = rest.last_mut().ok_or("chain too short")?;
    first
        .handle
        .send_to(last.identity.clone(), args.message.clone())
        .await
        .map_err(|e| e.to_string())?;
    info!(from = %first.identity, to = %last.identity, "Message sent");

    while let Some(event) = last.events.recv().await {
        if let NodeEvent::MessageDelivered { from, body } = event {
            info!(node = %last.identity, from = %from, body = %body, "Message delivered");
            break;
        }
    }
    while let Some(event) = first.events.recv().await {
        if let NodeEvent::AckReceived {
            from,
            rtt,
            forward_path,
        } = event
        {
            let path: Vec<&str> = forward_path.iter().map(|p| p.as_str()).collect();
            info!(
                node = %first.identity,
                from = %from,
                rtt_ms = rtt.as_millis() as u64,
                path = ?path,
                "Ack received"
            );
            return Ok(());
        }
    }
    Err("event stream closed before ack".to_string())
}
