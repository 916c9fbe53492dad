//! Configuration module for the market data handler

use serde::Deserialize;
use std::env;
use std::net::SocketAddr;

use crate::error::MarketDataError;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Coin whose book is streamed at startup (e.g. "BTC")
    pub coin: String,

    /// WebSocket endpoint for the `l2Book` channel
    pub ws_endpoint: String,

    /// REST `info` endpoint for snapshots and fills
    pub info_endpoint: String,

    /// Account used by `/positions` when the request names none
    pub account: Option<String>,

    /// Bind address of the HTTP API
    pub http_addr: SocketAddr,

    /// Levels per side returned in depth views
    pub depth_levels: usize,

    /// Base reconnection delay, doubled per failed attempt
    pub reconnect_delay_ms: u64,

    /// Book status logging interval in seconds
    pub health_check_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let http_addr = match env::var("HTTP_ADDR") {
            Ok(raw) => raw.parse().map_err(|e| {
                MarketDataError::ConfigError(format!("invalid HTTP_ADDR {:?}: {}", raw, e))
            })?,
            Err(_) => defaults.http_addr,
        };

        Ok(Self {
            coin: env::var("COIN")
                .map(|c| c.trim().to_string())
                .ok()
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.coin),
            ws_endpoint: env::var("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            info_endpoint: env::var("INFO_ENDPOINT").unwrap_or(defaults.info_endpoint),
            account: env::var("ACCOUNT").ok().filter(|a| !a.trim().is_empty()),
            http_addr,
            depth_levels: parse_or("DEPTH_LEVELS", defaults.depth_levels),
            reconnect_delay_ms: parse_or("RECONNECT_DELAY_MS", defaults.reconnect_delay_ms),
            health_check_interval_secs: parse_or(
                "HEALTH_CHECK_INTERVAL_SECS",
                defaults.health_check_interval_secs,
            ),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coin: "BTC".to_string(),
            ws_endpoint: "wss://api.hyperliquid.xyz/ws".to_string(),
            info_endpoint: "https://api.hyperliquid.xyz/info".to_string(),
            account: None,
            http_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            depth_levels: 20,
            reconnect_delay_ms: 1000,
            health_check_interval_secs: 30,
        }
    }
}
