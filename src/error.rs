//! Error types for the market data handler and reconstruction engines

use thiserror::Error;

/// Market data handler errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    /// A book payload had the right shape but an unparseable or invalid field
    #[error("Malformed book payload: {0}")]
    MalformedPayload(String),

    /// A message matched no known shape; the stream manager logs and skips it
    #[error("Unrecognized message: {0}")]
    UnrecognizedMessage(String),

    /// A fill that cannot take part in position reconstruction
    #[error("Malformed fill for {coin} at {timestamp}: {reason}")]
    MalformedFill {
        coin: String,
        timestamp: u64,
        reason: String,
    },

    #[error("REST API error: {0}")]
    RestApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection timeout")]
    ConnectionTimeout,
}

impl MarketDataError {
    pub fn malformed_fill(coin: &str, timestamp: u64, reason: impl Into<String>) -> Self {
        MarketDataError::MalformedFill {
            coin: coin.to_string(),
            timestamp,
            reason: reason.into(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MarketDataError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        MarketDataError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> Self {
        MarketDataError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        MarketDataError::RestApiError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketDataError>;
