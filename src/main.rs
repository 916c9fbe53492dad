//! perp-flow - Market Data Handler
//!
//! Streams the `l2Book` channel for the configured coin, keeps the latest
//! normalized book in memory, and serves depth views and reconstructed
//! positions over HTTP.

use std::sync::Arc;

use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use perp_flow::{server, AppState, Config, WebSocketManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting perp-flow market data handler");

    let config = Config::load()?;
    info!(
        coin = %config.coin,
        ws_endpoint = %config.ws_endpoint,
        info_endpoint = %config.info_endpoint,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::new(config));

    let http_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(http_state).await {
            warn!(error = %e, "HTTP server error");
        }
    });

    let mut ws_manager = WebSocketManager::new(state);
    ws_manager.run().await?;

    Ok(())
}
