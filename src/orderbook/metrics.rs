//! Order book metrics calculation
//!
//! Computed over the normalized ladders as delivered: the first level of each
//! side is taken as its best price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderBookState, PriceLevel};

/// Levels used for the simple imbalance
const IMBALANCE_LEVELS: usize = 5;
/// Levels and per-level decay used for the weighted imbalance
const WEIGHTED_LEVELS: usize = 10;
const WEIGHT_DECAY: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

/// Computed metrics for an order book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMetrics {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,

    /// Mid price (average of best bid and ask)
    pub mid_price: Option<Decimal>,

    /// Spread in basis points
    pub spread_bps: Option<Decimal>,

    /// Simple imbalance: (bid_vol - ask_vol) / (bid_vol + ask_vol)
    pub imbalance: Option<Decimal>,

    /// Weighted imbalance (exponential decay with distance from the top)
    pub weighted_imbalance: Option<Decimal>,

    /// Total bid depth (volume)
    pub bid_depth: Decimal,

    /// Total ask depth (volume)
    pub ask_depth: Decimal,

    pub bid_levels: usize,
    pub ask_levels: usize,
}

impl BookMetrics {
    pub fn from_state(state: &OrderBookState) -> Self {
        let best_bid = state.bids.first().map(|l| l.price);
        let best_ask = state.asks.first().map(|l| l.price);

        let mid_price = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => bid.checked_add(ask).map(|sum| sum / Decimal::TWO),
            _ => None,
        };
        let spread_bps = match (best_bid, best_ask, mid_price) {
            (Some(bid), Some(ask), Some(mid)) if mid > Decimal::ZERO => ask
                .checked_sub(bid)
                .and_then(|spread| spread.checked_div(mid))
                .and_then(|ratio| ratio.checked_mul(Decimal::from(10_000))),
            _ => None,
        };

        Self {
            best_bid,
            best_ask,
            mid_price,
            spread_bps,
            imbalance: imbalance(&state.bids, &state.asks, IMBALANCE_LEVELS, Decimal::ONE),
            weighted_imbalance: imbalance(&state.bids, &state.asks, WEIGHTED_LEVELS, WEIGHT_DECAY),
            bid_depth: total_size(&state.bids),
            ask_depth: total_size(&state.asks),
            bid_levels: state.bids.len(),
            ask_levels: state.asks.len(),
        }
    }

    /// Check if the order book is healthy (has valid data)
    pub fn is_healthy(&self) -> bool {
        self.mid_price.is_some()
            && self.spread_bps.is_some()
            && self.bid_levels > 0
            && self.ask_levels > 0
    }
}

/// Sum of level sizes, saturating at `Decimal::MAX`
fn total_size(side: &[PriceLevel]) -> Decimal {
    side.iter()
        .fold(Decimal::ZERO, |total, level| total.saturating_add(level.size))
}

/// (bid - ask) / (bid + ask) over the top `levels`, each level weighted by
/// `decay^i`. A decay of one gives the plain imbalance. `None` when both
/// sides are empty or the volumes overflow.
fn imbalance(
    bids: &[PriceLevel],
    asks: &[PriceLevel],
    levels: usize,
    decay: Decimal,
) -> Option<Decimal> {
    let weighted = |side: &[PriceLevel]| -> Option<Decimal> {
        let mut weight = Decimal::ONE;
        let mut total = Decimal::ZERO;
        for level in side.iter().take(levels) {
            total = total.checked_add(level.size.checked_mul(weight)?)?;
            weight = weight.checked_mul(decay)?;
        }
        Some(total)
    };

    let bid_volume = weighted(bids)?;
    let ask_volume = weighted(asks)?;
    let total = bid_volume.checked_add(ask_volume)?;
    if total > Decimal::ZERO {
        (bid_volume - ask_volume).checked_div(total)
    } else {
        None
    }
}
