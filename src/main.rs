//! Relay server binary.
//!
//! Peers connect to `/ws` to join the editing session; `/health` reports how
//! many are connected.

use tracing::info;
use tracing_subscriber::EnvFilter;

use causal_rga::Config;
use causal_rga::server::{PeerRegistry, create_router};

#[tokio::main]
async fn main() -> causal_rga::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let app = create_router(PeerRegistry::new());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Relay listening on {}", listener.local_addr()?);
    info!("Available endpoints:");
    info!("  GET /health - Connected peers");
    info!("  GET /ws     - Join the session");

    axum::serve(listener, app).await?;
    Ok(())
}
