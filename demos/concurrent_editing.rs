//! Concurrent editing through a relay.
//!
//! Starts a relay on a loopback port and connects several writers to it.
//! Each writer types into the shared document while handling whatever the
//! others send, and a late joiner receives the full history by sync.
//!
//! Run with: cargo run --example concurrent_editing

use std::time::{Duration, Instant};

use causal_rga::server::{PeerRegistry, create_router};
use causal_rga::{Config, Replica, TransportEvent, WsTransport};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

const WRITERS: [&str; 3] = ["[one]", "[two]", "[three]"];

/// Handles events until none arrive for a while.
async fn settle(replica: &mut Replica<WsTransport>, events: &mut UnboundedReceiver<TransportEvent>) {
    while let Ok(Some(event)) = timeout(Duration::from_millis(300), events.recv()).await {
        if !replica.handle_event(event).unwrap() {
            break;
        }
    }
}

async fn writer(url: String, phrase: &'static str, config: Config) -> (String, String) {
    let (transport, mut events) = WsTransport::connect(&url).await.unwrap();
    let mut replica = Replica::join(transport, &mut events, &config).await.unwrap();

    for ch in phrase.chars() {
        replica.poll_events(&mut events).unwrap();
        let end = replica.tree().len();
        replica.insert(ch, end).unwrap();
        sleep(Duration::from_millis(5)).await;
    }
    settle(&mut replica, &mut events).await;

    (replica.site().clone(), replica.text())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Concurrent Editing Through a Relay ===\n");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, create_router(PeerRegistry::new()))
            .await
            .unwrap();
    });
    let config = Config::default().with_sync_batch_size(4);

    // the first writer stays connected so late joiners have someone to sync from
    let (transport, mut host_events) = WsTransport::connect(&url).await.unwrap();
    let mut host = Replica::join(transport, &mut host_events, &config)
        .await
        .unwrap();
    host.insert_str(0, "shared:").unwrap();

    let start = Instant::now();
    let handles: Vec<_> = WRITERS
        .iter()
        .map(|phrase| tokio::spawn(writer(url.clone(), phrase, config.clone())))
        .collect();

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if let Ok(Some(event)) = timeout(Duration::from_millis(50), host_events.recv()).await {
            host.handle_event(event).unwrap();
        }
    }

    println!("{:<10} {}", host.site(), host.text());
    let mut converged = true;
    for handle in handles {
        let (site, text) = handle.await.unwrap();
        converged &= text == host.text();
        println!("{:<10} {}", site, text);
    }
    println!(
        "\n{} writers in {:?}, converged: {}",
        WRITERS.len() + 1,
        start.elapsed(),
        converged
    );
}
