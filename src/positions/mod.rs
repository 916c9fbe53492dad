//! Position lifecycle reconstruction
//!
//! Turns an account's raw fill history into completed round-trips using
//! average-cost accounting on a signed position per coin.

mod order_pnl;
mod reconstruct;
mod state;

pub use order_pnl::{summarize_by_order, OrderPnl};
pub use reconstruct::{reconstruct, reconstruct_with_report, Reconstruction, RejectedFill};
pub use state::{ClosedRoundTrip, OpenPosition, PositionState, Step};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MarketDataError, Result};

/// Aggressor side of a fill from the account's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Accepts the exchange's `B`/`A` codes as well as spelled-out names
    pub fn from_feed(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "b" | "buy" | "bid" | "long" => Some(Side::Buy),
            "a" | "s" | "sell" | "ask" | "short" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Direction of an open or completed position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Direction implied by a signed size; `None` for zero
    pub fn of(signed_size: Decimal) -> Option<Self> {
        if signed_size > Decimal::ZERO {
            Some(Direction::Long)
        } else if signed_size < Decimal::ZERO {
            Some(Direction::Short)
        } else {
            None
        }
    }

    pub fn sign(self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

/// A single execution on the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub coin: String,
    pub side: Side,
    pub size: Decimal,
    pub price: Decimal,
    /// Exchange time in milliseconds
    pub timestamp: u64,
    pub order_id: Option<u64>,
    pub client_order_id: Option<String>,
    pub trade_id: Option<u64>,
    /// Realized P&L as precomputed by the exchange, if it sent one
    pub closed_pnl: Option<Decimal>,
}

impl Fill {
    pub fn new(coin: &str, side: Side, size: Decimal, price: Decimal, timestamp: u64) -> Self {
        Self {
            coin: coin.to_string(),
            side,
            size,
            price,
            timestamp,
            order_id: None,
            client_order_id: None,
            trade_id: None,
            closed_pnl: None,
        }
    }

    pub fn with_order_id(mut self, order_id: u64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_closed_pnl(mut self, closed_pnl: Decimal) -> Self {
        self.closed_pnl = Some(closed_pnl);
        self
    }

    /// Positive for buys, negative for sells
    pub fn signed_size(&self) -> Decimal {
        match self.side {
            Side::Buy => self.size,
            Side::Sell => -self.size,
        }
    }

    /// Reject fills that cannot move a position
    pub fn validate(&self) -> Result<()> {
        if self.size <= Decimal::ZERO {
            return Err(MarketDataError::malformed_fill(
                &self.coin,
                self.timestamp,
                format!("non-positive size {}", self.size),
            ));
        }
        if self.price <= Decimal::ZERO {
            return Err(MarketDataError::malformed_fill(
                &self.coin,
                self.timestamp,
                format!("non-positive price {}", self.price),
            ));
        }
        Ok(())
    }
}

/// A completed round-trip, from flat back to flat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub coin: String,
    pub direction: Direction,
    pub open_timestamp: u64,
    pub close_timestamp: u64,
    pub duration_ms: u64,
    pub realized_pnl_usd: Decimal,
}

impl PositionRecord {
    pub fn from_round_trip(coin: &str, trip: ClosedRoundTrip) -> Self {
        Self {
            coin: coin.to_string(),
            direction: trip.direction,
            open_timestamp: trip.opened_at,
            close_timestamp: trip.closed_at,
            duration_ms: trip.closed_at.saturating_sub(trip.opened_at),
            realized_pnl_usd: trip.realized_pnl,
        }
    }
}
