//! Event loop integration over the in-process transport.

use super::*;
use crate::transport::memory::{MemoryHub, MemoryTransport};
use crate::transport::event_channel;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// A node running its event loop on a tokio task.
struct RunningNode {
    handle: NodeHandle,
    events: NodeEventRx,
    task: JoinHandle<Node<MemoryTransport>>,
}

fn spawn_node(hub: &MemoryHub, name: &str) -> RunningNode {
    let (event_tx, event_rx) = event_channel(256);
    let transport = hub.register(id(name), event_tx).unwrap();
    let mut node = Node::with_identity(id(name), Config::new(), transport);
    let events = node.subscribe();
    let (command_tx, command_rx) = command_channel(32);

    let task = tokio::spawn(async move {
        node.run(event_rx, command_rx).await;
        node
    });

    RunningNode {
        handle: NodeHandle::new(command_tx),
        events,
        task,
    }
}

/// Poll a node's route entries until `expected` are all present.
async fn wait_for_routes(node: &RunningNode, expected: &[&str]) {
    for _ in 0..500 {
        let routes = node.handle.routes().await.unwrap();
        if expected
            .iter()
            .all(|name| routes.iter().any(|e| e.destination.as_str() == *name))
        {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("routes {:?} never appeared", expected);
}

/// Wait for the first event matching `pred`.
async fn wait_for_event<F>(node: &mut RunningNode, pred: F) -> NodeEvent
where
    F: Fn(&NodeEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = node.events.recv().await.expect("event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn shutdown(nodes: Vec<RunningNode>) {
    for node in nodes {
        node.handle.shutdown().await.unwrap();
        node.task.await.unwrap();
    }
}

#[tokio::test]
async fn test_chain_over_memory_hub() {
    let hub = MemoryHub::new();
    let mut a = spawn_node(&hub, "A");
    let b = spawn_node(&hub, "B");
    let mut c = spawn_node(&hub, "C");

    hub.connect_range(&id("A"), &id("B")).unwrap();
    wait_for_routes(&a, &["B"]).await;
    hub.connect_range(&id("B"), &id("C")).unwrap();
    wait_for_routes(&a, &["B", "C"]).await;
    wait_for_routes(&c, &["A", "B"]).await;
    assert_eq!(hub.session_count(), 2);

    a.handle.send_to(id("C"), "hello").await.unwrap();

    let delivered = wait_for_event(&mut c, |e| matches!(e, NodeEvent::MessageDelivered { .. })).await;
    assert_eq!(
        delivered,
        NodeEvent::MessageDelivered {
            from: id("A"),
            body: "hello".to_string()
        }
    );

    let acked = wait_for_event(&mut a, |e| matches!(e, NodeEvent::AckReceived { .. })).await;
    match acked {
        NodeEvent::AckReceived {
            from, forward_path, ..
        } => {
            assert_eq!(from, id("C"));
            assert_eq!(forward_path, vec![id("B")]);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let routes = a.handle.routes().await.unwrap();
    let c_entry = routes.iter().find(|e| e.destination == id("C")).unwrap();
    assert!(c_entry.rtt.is_some());

    let err = a.handle.send_to(id("Z"), "nobody").await.unwrap_err();
    assert!(matches!(err, NodeError::UnroutableDestination(_)));

    shutdown(vec![a, b, c]).await;
}

#[tokio::test]
async fn test_declined_peer_links_after_retry() {
    let hub = MemoryHub::new();
    let a = spawn_node(&hub, "A");
    let b = spawn_node(&hub, "B");
    let c = spawn_node(&hub, "C");

    // Both ranges at once; B may turn C away while busy with A.
    hub.connect_range(&id("A"), &id("B")).unwrap();
    hub.connect_range(&id("B"), &id("C")).unwrap();

    wait_for_routes(&a, &["B", "C"]).await;
    wait_for_routes(&c, &["A", "B"]).await;

    shutdown(vec![a, b, c]).await;
}

#[tokio::test]
async fn test_teardown_and_shutdown() {
    let hub = MemoryHub::new();
    let a = spawn_node(&hub, "A");
    let b = spawn_node(&hub, "B");

    hub.connect_range(&id("A"), &id("B")).unwrap();
    wait_for_routes(&a, &["B"]).await;
    wait_for_routes(&b, &["A"]).await;

    b.handle.teardown().await.unwrap();
    assert!(b.handle.routes().await.unwrap().is_empty());

    // A hears the disconnect and drops everything it learned through B.
    for _ in 0..500 {
        if a.handle.routes().await.unwrap().is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(a.handle.routes().await.unwrap().is_empty());
    assert_eq!(hub.session_count(), 0);

    let handle = b.handle.clone();
    shutdown(vec![a, b]).await;
    assert!(matches!(handle.routes().await, Err(NodeError::NotRunning)));
}
