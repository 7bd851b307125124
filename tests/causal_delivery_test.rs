//! Causal delivery tests.
//!
//! Mailbox ordering scenarios driven with hand-built vector clocks, and full
//! replica sessions wired through the in-process hub.

use causal_rga::causal::{CausalMailbox, DEFAULT_SYNC_BATCH_SIZE, Delivery, VectorClock, WireMessage};
use causal_rga::crdt::RemoveOp;
use causal_rga::transport::LocalTransport;
use causal_rga::{Config, LocalHub, Operation, Replica, Timestamp, TransportEvent};
use tokio::sync::mpsc::UnboundedReceiver;

fn remove_op_msg(clock: u64, sender: &str, entries: &[(&str, u64)]) -> String {
    let vclock = VectorClock::with_entries(sender, entries.iter().map(|(s, c)| (*s, *c)));
    let op: Operation<char> = RemoveOp {
        timestamp: Timestamp::new("some-site", clock),
    }
    .into();
    WireMessage::operation(vclock, op).encode().unwrap()
}

fn delivered(rx: &mut UnboundedReceiver<Delivery<char>>) -> Vec<u64> {
    let mut clocks = Vec::new();
    while let Ok(delivery) = rx.try_recv() {
        if let Delivery::Operation(op) = delivery {
            clocks.push(op.timestamp().clock);
        }
    }
    clocks
}

#[test]
fn test_out_of_order_messages_from_one_sender() {
    let (mut b, mut rx) = CausalMailbox::<char>::new("B", DEFAULT_SYNC_BATCH_SIZE);

    b.handle(&remove_op_msg(2, "A", &[("A", 2), ("B", 0)])).unwrap();
    assert!(delivered(&mut rx).is_empty());
    assert_eq!(b.pending(), 1);

    b.handle(&remove_op_msg(1, "A", &[("A", 1), ("B", 0)])).unwrap();
    assert_eq!(delivered(&mut rx), vec![1, 2]);
    assert_eq!(b.pending(), 0);
}

#[test]
fn test_dependency_across_senders_is_held_back() {
    let (mut a, mut rx) = CausalMailbox::<char>::new("A", DEFAULT_SYNC_BATCH_SIZE);

    a.handle(&remove_op_msg(2, "B", &[("A", 0), ("B", 1), ("C", 1)]))
        .unwrap();
    assert!(delivered(&mut rx).is_empty());

    a.handle(&remove_op_msg(1, "C", &[("A", 0), ("B", 0), ("C", 1)]))
        .unwrap();
    assert_eq!(delivered(&mut rx), vec![1, 2]);
    assert_eq!(a.clock().get("B"), 1);
    assert_eq!(a.clock().get("C"), 1);
}

#[test]
fn test_concurrent_messages_drawn_by_site_when_a_arrives_first() {
    let (mut b, mut rx) = CausalMailbox::<char>::new("B", DEFAULT_SYNC_BATCH_SIZE);

    b.handle(&remove_op_msg(3, "A", &[("A", 2), ("B", 0), ("C", 0)]))
        .unwrap();
    b.handle(&remove_op_msg(2, "C", &[("A", 0), ("B", 0), ("C", 1)]))
        .unwrap();
    b.handle(&remove_op_msg(1, "A", &[("A", 1), ("B", 0), ("C", 0)]))
        .unwrap();

    assert_eq!(delivered(&mut rx), vec![1, 3, 2]);
}

#[test]
fn test_concurrent_messages_drawn_by_site_when_c_arrives_first() {
    let (mut b, mut rx) = CausalMailbox::<char>::new("B", DEFAULT_SYNC_BATCH_SIZE);

    b.handle(&remove_op_msg(3, "C", &[("A", 0), ("B", 0), ("C", 2)]))
        .unwrap();
    b.handle(&remove_op_msg(2, "A", &[("A", 1), ("B", 0), ("C", 0)]))
        .unwrap();
    b.handle(&remove_op_msg(1, "C", &[("A", 0), ("B", 0), ("C", 1)]))
        .unwrap();

    assert_eq!(delivered(&mut rx), vec![2, 1, 3]);
}

#[test]
fn test_late_joiner_receives_history_in_batches() {
    let hub = LocalHub::new();
    let config = Config::default().with_sync_batch_size(3);

    let (ta, mut ea) = hub.connect_as("alice");
    let mut alice = Replica::new("alice", ta, &config);
    alice.poll_events(&mut ea).unwrap();
    alice.insert_str(0, "Hello world").unwrap();
    alice.remove(5).unwrap();

    let (tb, mut eb) = hub.connect_as("bob");
    let mut bob = Replica::new("bob", tb, &config);

    alice.poll_events(&mut ea).unwrap(); // sync request for bob
    let handled = bob.poll_events(&mut eb).unwrap();
    assert_eq!(handled, 1 + 12_usize.div_ceil(3)); // id + batches

    assert_eq!(bob.text(), "Helloworld");
    assert_eq!(bob.mailbox().clock().get("alice"), 12);

    // live edits from alice continue right after the synced history
    alice.insert('!', 10).unwrap();
    bob.poll_events(&mut eb).unwrap();
    assert_eq!(bob.text(), "Helloworld!");
    assert_eq!(bob.mailbox().pending(), 0);
}

fn drain(sessions: &mut [(Replica<LocalTransport>, UnboundedReceiver<TransportEvent>)]) {
    for (replica, events) in sessions.iter_mut() {
        replica.poll_events(events).unwrap();
    }
}

#[test]
fn test_three_sessions_converge() {
    let hub = LocalHub::new();
    let config = Config::default();
    let mut sessions = Vec::new();
    for site in ["a", "b", "c"] {
        let (transport, events) = hub.connect_as(site);
        sessions.push((Replica::new(site, transport, &config), events));
    }
    drain(&mut sessions);

    sessions[0].0.insert_str(0, "one").unwrap();
    sessions[1].0.insert_str(0, "two").unwrap();
    drain(&mut sessions);
    sessions[2].0.insert_str(3, "-").unwrap();
    sessions[0].0.remove(0).unwrap();
    drain(&mut sessions);
    drain(&mut sessions);

    let text = sessions[0].0.text();
    assert_eq!(text.len(), 6);
    for (replica, _) in &sessions {
        assert_eq!(replica.text(), text);
        assert_eq!(replica.mailbox().pending(), 0);
    }
}
