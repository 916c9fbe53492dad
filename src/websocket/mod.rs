//! WebSocket module for the `l2Book` stream

mod client;
mod manager;
mod session;

pub use client::WebSocketClient;
pub use manager::WebSocketManager;
pub use session::{CoinSession, SnapshotTicket};
