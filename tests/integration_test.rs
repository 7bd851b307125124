//! Integration tests for the replicated tree.
//!
//! These tests verify convergence across replicas under concurrent editing,
//! idempotent application, and that operations survive the wire format.

use causal_rga::causal::{Payload, VectorClock, WireMessage};
use causal_rga::{InsertOp, Operation, ReplicatedTree};
use proptest::prelude::*;

fn apply_all(tree: &mut ReplicatedTree<char>, ops: &[InsertOp<char>]) {
    for op in ops {
        tree.apply(&Operation::Insert(op.clone())).unwrap();
    }
}

#[test]
fn test_basic_tree_operations() {
    let mut tree = ReplicatedTree::new("1");
    assert_eq!(tree.text(), "");
    assert!(tree.is_empty());

    tree.insert_str(0, "ABC").unwrap();
    assert_eq!(tree.text(), "ABC");
    assert_eq!(tree.len(), 3);

    tree.remove(1).unwrap();
    assert_eq!(tree.text(), "AC");
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.total_node_count(), 3); // Including tombstones
    assert_eq!(tree.get(1), Some(&'C'));
}

#[test]
fn test_concurrent_edits_converge_to_hello_reader_alice() {
    let mut site1 = ReplicatedTree::new("site-1");
    let mut site2 = ReplicatedTree::new("site-2");

    let hello = site1.insert_str(0, "Hello!").unwrap();
    apply_all(&mut site2, &hello);

    let reader = site1.insert_str(5, " reader").unwrap();
    let alice = site2.insert_str(5, " Alice").unwrap();

    apply_all(&mut site1, &alice);
    apply_all(&mut site2, &reader);

    assert_eq!(site1.text(), "Hello reader Alice!");
    assert_eq!(site2.text(), "Hello reader Alice!");
}

#[test]
fn test_concurrent_siblings_ordered_by_minimum_difference() {
    let mut origin = ReplicatedTree::new("a");
    let x = origin.insert('x', 0).unwrap();

    let mut b = ReplicatedTree::new("b");
    let mut c = ReplicatedTree::new("c");
    b.apply(&x.clone().into()).unwrap();
    c.apply(&x.clone().into()).unwrap();

    // same reference, same witnesses: only the new timestamps differ
    let from_b = b.insert('B', 0).unwrap();
    let from_c = c.insert('C', 0).unwrap();
    assert_eq!(from_b.happened_before, from_c.happened_before);

    let mut first = ReplicatedTree::new("r1");
    let mut second = ReplicatedTree::new("r2");
    for op in [&x, &from_b, &from_c] {
        first.apply(&op.clone().into()).unwrap();
    }
    for op in [&x, &from_c, &from_b] {
        second.apply(&op.clone().into()).unwrap();
    }

    assert_eq!(first.to_array(), second.to_array());
    assert_eq!(first.text(), "CBx");
}

#[test]
fn test_three_replicas_converge() {
    let mut a = ReplicatedTree::new("a");
    let mut b = ReplicatedTree::new("b");
    let mut c = ReplicatedTree::new("c");

    let base = a.insert_str(0, "shared").unwrap();
    apply_all(&mut b, &base);
    apply_all(&mut c, &base);

    let from_a: Vec<Operation<char>> = a
        .insert_str(0, ">>")
        .unwrap()
        .into_iter()
        .map(Operation::from)
        .collect();
    let mut from_b: Vec<Operation<char>> = vec![b.remove(2).unwrap().into()];
    from_b.extend(b.insert_str(5, "!").unwrap().into_iter().map(Operation::from));
    let from_c: Vec<Operation<char>> = c
        .insert_str(3, "__")
        .unwrap()
        .into_iter()
        .map(Operation::from)
        .collect();

    for op in from_b.iter().chain(&from_c) {
        a.apply(op).unwrap();
    }
    for op in from_c.iter().chain(&from_a) {
        b.apply(op).unwrap();
    }
    for op in from_a.iter().chain(&from_b) {
        c.apply(op).unwrap();
    }

    assert_eq!(a.text(), b.text());
    assert_eq!(b.text(), c.text());
    assert_eq!(a.text(), ">>sh__red!");
}

#[test]
fn test_operations_survive_the_wire() {
    let mut source = ReplicatedTree::new("a");
    source.insert_str(0, "wire").unwrap();
    let insert = source.insert('!', 4).unwrap();
    let remove = source.remove(0).unwrap();

    let mut replica = ReplicatedTree::new("b");
    let mut clock = VectorClock::new("a");
    for op in source.history() {
        clock.increment();
        let raw = WireMessage::operation(clock.clone(), op).encode().unwrap();
        let decoded = WireMessage::<char>::decode(&raw).unwrap();
        assert_eq!(decoded.vector_clock, clock);
        match decoded.payload {
            Payload::Operation(op) => replica.apply(&op).unwrap(),
            Payload::Sync(_) => panic!("expected an operation"),
        }
    }

    assert_eq!(replica.text(), "ire!");
    assert!(replica.contains(&insert.timestamp));
    assert!(replica.contains(&remove.timestamp));
}

/// Replays one site's ops into another tree, interleaving sites by `choices`
/// while keeping each site's own order.
fn interleave(logs: &[Vec<Operation<char>>], choices: &[usize]) -> Vec<Operation<char>> {
    let mut cursors = vec![0; logs.len()];
    let mut merged = Vec::new();
    let mut choice = choices.iter().cycle();
    let total: usize = logs.iter().map(Vec::len).sum();
    while merged.len() < total {
        let start = choice.next().copied().unwrap_or(0);
        let site = (0..logs.len())
            .map(|offset| (start + offset) % logs.len())
            .find(|&site| cursors[site] < logs[site].len())
            .unwrap();
        merged.push(logs[site][cursors[site]].clone());
        cursors[site] += 1;
    }
    merged
}

proptest! {
    #[test]
    fn prop_replicas_converge_in_any_interleaving(
        edits in prop::collection::vec((0usize..3, any::<bool>(), any::<u8>(), any::<char>()), 1..40),
        order_one in prop::collection::vec(0usize..3, 1..20),
        order_two in prop::collection::vec(0usize..3, 1..20),
    ) {
        let mut sites: Vec<ReplicatedTree<char>> =
            ["a", "b", "c"].into_iter().map(ReplicatedTree::new).collect();
        let mut logs: Vec<Vec<Operation<char>>> = vec![Vec::new(); 3];

        for (site, is_insert, position, value) in edits {
            let tree = &mut sites[site];
            if is_insert || tree.is_empty() {
                let position = position as usize % (tree.len() + 1);
                logs[site].push(tree.insert(value, position).unwrap().into());
            } else {
                let position = position as usize % tree.len();
                logs[site].push(tree.remove(position).unwrap().into());
            }
        }

        let mut first = ReplicatedTree::new("x");
        let mut second = ReplicatedTree::new("y");
        for op in interleave(&logs, &order_one) {
            first.apply(&op).unwrap();
        }
        for op in interleave(&logs, &order_two) {
            second.apply(&op).unwrap();
            // applying twice changes nothing
            second.apply(&op).unwrap();
        }

        prop_assert_eq!(first.to_array(), second.to_array());
        prop_assert_eq!(first.pre_order_values(), first.to_array());
        prop_assert_eq!(first.total_node_count(), second.total_node_count());
    }
}
