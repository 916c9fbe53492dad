//! perp-flow - Order book normalization and position reconstruction
//!
//! This crate streams `l2Book` data for a perpetual-futures venue into a
//! normalized, depth-annotated book and rebuilds an account's completed
//! positions from its fill history. The engines in [`orderbook`] and
//! [`positions`] are pure; [`info`] and [`websocket`] feed them.

use std::sync::Arc;
use tokio::sync::{watch, RwLock};

pub mod config;
pub mod error;
pub mod info;
pub mod metrics;
pub mod numeric;
pub mod orderbook;
pub mod parser;
pub mod positions;
pub mod server;
pub mod websocket;

pub use config::Config;
pub use error::{MarketDataError, Result};
pub use info::InfoClient;
pub use orderbook::{compute_depth, max_size, normalize, DepthRow, DepthView, OrderBookState, PriceLevel};
pub use parser::{parse_fills, ParsedMessage};
pub use positions::{reconstruct, reconstruct_with_report, summarize_by_order, Fill, PositionRecord};
pub use websocket::WebSocketManager;

/// Application state shared across components
pub struct AppState {
    /// Latest book for the active coin, replaced wholesale on every update
    pub book: Arc<RwLock<Option<OrderBookState>>>,
    /// Active coin selection; the stream manager follows it
    pub coin_tx: watch::Sender<String>,
    pub info_client: InfoClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (coin_tx, _) = watch::channel(config.coin.clone());
        Self {
            book: Arc::new(RwLock::new(None)),
            coin_tx,
            info_client: InfoClient::new(&config.info_endpoint),
            config: Arc::new(config),
        }
    }
}
