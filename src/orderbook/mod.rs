//! Order book module
//!
//! Normalizes `l2Book` snapshot and streaming payloads into a canonical ladder
//! and derives cumulative depth from it. Every update replaces the previous
//! book wholesale; nothing here merges deltas.

mod depth;
mod metrics;
mod normalizer;

pub use depth::{compute_depth, max_size, DepthView};
pub use metrics::BookMetrics;
pub use normalizer::normalize;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// One side of the book, best price first, in the order the feed sent it
pub type BookSide = Vec<PriceLevel>;

/// Normalized order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookState {
    /// Absent when a streaming message omits it
    pub coin: Option<String>,
    /// Exchange timestamp in milliseconds, when the payload carries one
    pub time: Option<u64>,
    pub bids: BookSide,
    pub asks: BookSide,
}

/// A level annotated with the cumulative size from the top of its side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRow {
    pub price: Decimal,
    pub size: Decimal,
    pub cumulative_size: Decimal,
}
