//! Message routing, delivery, acknowledgments and RTT.

use super::*;

#[test]
fn test_end_to_end_delivery_and_ack() {
    let mut net = TestNet::chain(&["A", "B", "C"]);
    let mut a_events = net.node_mut("A").subscribe();
    let mut b_events = net.node_mut("B").subscribe();
    let mut c_events = net.node_mut("C").subscribe();

    let now = net.now_ms;
    net.node_mut("A").send_to(&id("C"), "hi", now).unwrap();
    assert_eq!(net.node("A").rtt().pending_since(&id("C")), Some(now));
    net.pump();

    let c_seen = drain_events(&mut c_events);
    assert!(c_seen.contains(&NodeEvent::MessageDelivered {
        from: id("A"),
        body: "hi".to_string()
    }));
    assert_eq!(net.node("C").routes().get(&id("A")).unwrap().last_message, "hi");

    // Data A->B->C and Ack C->B->A: four hops.
    let rtt = Duration::from_millis(4 * HOP_DELAY_MS);
    let a_seen = drain_events(&mut a_events);
    assert!(a_seen.contains(&NodeEvent::AckReceived {
        from: id("C"),
        rtt,
        forward_path: vec![id("B")],
    }));
    assert_eq!(net.node("A").routes().get(&id("C")).unwrap().rtt, Some(rtt));
    assert!(net.node("A").rtt().is_empty());

    // The relay learns nothing from traffic it only forwards.
    assert!(drain_events(&mut b_events).is_empty());
    let b_entry = net.node("B").routes().get(&id("C")).unwrap();
    assert_eq!(b_entry.last_message, "");
    assert_eq!(b_entry.rtt, None);
}

#[test]
fn test_neighbor_delivery_has_empty_forward_path() {
    let mut net = TestNet::chain(&["A", "B"]);
    let mut events = net.node_mut("B").subscribe();

    let now = net.now_ms;
    net.node_mut("B").send_to(&id("A"), "yo", now).unwrap();
    net.pump();

    assert!(drain_events(&mut events).contains(&NodeEvent::AckReceived {
        from: id("A"),
        rtt: Duration::from_millis(2 * HOP_DELAY_MS),
        forward_path: vec![],
    }));
    assert_eq!(
        net.node("B").routes().get(&id("A")).unwrap().rtt_display(),
        format!("{}ms", 2 * HOP_DELAY_MS)
    );
}

#[test]
fn test_ack_carries_receive_time() {
    let mut node = make_node("C");
    open_link_with(&mut node, "B", &["A", "B"]);

    receive(&mut node, "B", &Message::data("hi", id("A"), id("C")), T0 + 42);
    assert_eq!(
        take_sent(&mut node),
        vec![(
            id("B"),
            Message::Ack {
                sent_at_ms: T0 + 42,
                sender: id("C"),
                destination: id("A"),
                forward_path: vec![],
            }
        )]
    );
}

#[test]
fn test_unroutable_destination() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B", "C"]);

    let err = node.send_to(&id("Z"), "x", T0).unwrap_err();
    assert!(matches!(err, NodeError::UnroutableDestination(ref dest) if dest == &id("Z")));
    assert!(take_sent(&mut node).is_empty());
    assert!(node.rtt().is_empty());
}

#[test]
fn test_send_to_self_unroutable() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B"]);
    assert!(matches!(
        node.send_to(&id("A"), "me", T0),
        Err(NodeError::UnroutableDestination(_))
    ));
}

#[test]
fn test_failed_send_records_no_rtt() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B"]);
    node.transport_mut().fail_sends = true;

    let err = node.send_to(&id("B"), "x", T0).unwrap_err();
    assert!(matches!(err, NodeError::SendFailed { ref peer, .. } if peer == &id("B")));
    assert!(node.rtt().is_empty());
}

#[test]
fn test_relay_picks_link_that_routes() {
    let mut node = make_node("B");
    open_link_with(&mut node, "A", &["A"]);
    open_link_with(&mut node, "C", &["C", "D"]);

    let data = Message::data("hi", id("A"), id("D"));
    receive(&mut node, "A", &data, T0);
    assert_eq!(take_sent(&mut node), vec![(id("C"), data)]);
}

#[test]
fn test_unroutable_relay_dropped() {
    let mut node = make_node("B");
    open_link_with(&mut node, "A", &["A"]);
    open_link_with(&mut node, "C", &["C"]);
    let mut events = node.subscribe();

    receive(&mut node, "A", &Message::data("hi", id("A"), id("Z")), T0);
    assert!(take_sent(&mut node).is_empty());
    assert!(drain_events(&mut events).is_empty());
}

#[test]
fn test_relay_never_returns_to_arrival_link() {
    let mut node = make_node("B");
    open_link_with(&mut node, "A", &["A", "Z"]);

    receive(&mut node, "A", &Message::data("hi", id("A"), id("Z")), T0);
    assert!(take_sent(&mut node).is_empty());
}

#[test]
fn test_ack_relay_appends_identity() {
    let mut node = make_node("C");
    open_link_with(&mut node, "B", &["A", "B"]);
    open_link_with(&mut node, "D", &["D"]);

    let ack = Message::Ack {
        sent_at_ms: T0,
        sender: id("D"),
        destination: id("A"),
        forward_path: vec![],
    };
    receive(&mut node, "D", &ack, T0);
    assert_eq!(
        take_sent(&mut node),
        vec![(
            id("B"),
            Message::Ack {
                sent_at_ms: T0,
                sender: id("D"),
                destination: id("A"),
                forward_path: vec![id("C")],
            }
        )]
    );
}

#[test]
fn test_unsolicited_ack_ignored() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B"]);
    let mut events = node.subscribe();

    receive(&mut node, "B", &Message::ack(T0, id("B"), id("A")), T0 + 10);
    assert!(drain_events(&mut events).is_empty());
    assert_eq!(node.routes().get(&id("B")).unwrap().rtt, None);
}

#[test]
fn test_rtt_never_negative() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B"]);
    node.send_to(&id("B"), "x", T0 + 1_000).unwrap();

    // The local clock stepped backwards before the Ack arrived.
    receive(&mut node, "B", &Message::ack(T0 + 1_000, id("B"), id("A")), T0);
    assert_eq!(node.routes().get(&id("B")).unwrap().rtt, Some(Duration::ZERO));
}

#[test]
fn test_delivery_from_unknown_sender_creates_entry() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B"]);

    receive(&mut node, "B", &Message::data("hello", id("Q"), id("A")), T0);
    let entry = node.routes().get(&id("Q")).unwrap();
    assert_eq!(entry.last_message, "hello");
    assert_eq!(node.routes().len(), 2);
}

#[test]
fn test_malformed_payload_counted() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B"]);
    let before = node.route_entries();

    node.handle_event(
        TransportEvent::Received {
            peer: id("B"),
            payload: b"{not json".to_vec(),
        },
        T0,
    );
    node.handle_event(
        TransportEvent::Received {
            peer: id("B"),
            payload: Vec::new(),
        },
        T0,
    );

    assert_eq!(node.link(&id("B")).unwrap().stats().decode_errors, 2);
    assert_eq!(node.route_entries(), before);
    assert!(take_sent(&mut node).is_empty());
}

#[test]
fn test_link_stats_track_traffic() {
    let mut node = make_node("A");
    open_link_with(&mut node, "B", &["B"]);
    let sent_before = node.link(&id("B")).unwrap().stats().messages_sent;

    node.send_to(&id("B"), "x", T0).unwrap();
    receive(&mut node, "B", &Message::ack(T0, id("B"), id("A")), T0 + 7);

    let stats = node.link(&id("B")).unwrap().stats();
    assert_eq!(stats.messages_sent, sent_before + 1);
    assert_eq!(stats.last_recv_ms, T0 + 7);
}
