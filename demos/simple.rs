//! Simple standalone example of replicated tree usage.
//!
//! Two users edit the same document without a network; their operations are
//! exchanged by hand to show that both copies converge.
//!
//! Run with: cargo run --example simple

use causal_rga::{Operation, ReplicatedTree};

fn exchange(to: &mut ReplicatedTree<char>, ops: &[Operation<char>]) {
    for op in ops {
        to.apply(op).expect("operation from a known replica");
    }
}

fn main() {
    println!("=== Simple Replicated Tree Example ===\n");

    let mut alice = ReplicatedTree::new("alice");
    let mut bob = ReplicatedTree::new("bob");

    println!("Alice types 'Hello!' and shares it with Bob");
    let hello: Vec<Operation<char>> = alice
        .insert_str(0, "Hello!")
        .unwrap()
        .into_iter()
        .map(Operation::from)
        .collect();
    exchange(&mut bob, &hello);
    println!("  Alice: '{}'", alice.text());
    println!("  Bob:   '{}'", bob.text());

    println!("\nBoth edit before the exclamation mark at the same time:");
    let reader: Vec<Operation<char>> = alice
        .insert_str(5, " reader")
        .unwrap()
        .into_iter()
        .map(Operation::from)
        .collect();
    let mut bobs: Vec<Operation<char>> = bob
        .insert_str(5, " Alice")
        .unwrap()
        .into_iter()
        .map(Operation::from)
        .collect();
    bobs.push(bob.remove(0).unwrap().into());
    println!("  Alice: '{}'", alice.text());
    println!("  Bob:   '{}'", bob.text());

    println!("\nAfter exchanging operations:");
    exchange(&mut alice, &bobs);
    exchange(&mut bob, &reader);
    println!("  Alice: '{}'", alice.text());
    println!("  Bob:   '{}'", bob.text());
    println!("  Converged: {}", alice.text() == bob.text());

    println!(
        "\nAlice holds {} visible of {} nodes (tombstones included)",
        alice.len(),
        alice.total_node_count()
    );
}
