//! Cumulative depth over a ladder
//!
//! Depth is summed in feed order. Bids and asks define "best" in opposite
//! directions, so sorting here without knowing the side would corrupt it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookMetrics, DepthRow, OrderBookState, PriceLevel};

/// Running cumulative size over a side, one row per level
///
/// The running total saturates at `Decimal::MAX` rather than overflowing.
pub fn compute_depth(side: &[PriceLevel]) -> Vec<DepthRow> {
    side.iter()
        .scan(Decimal::ZERO, |cumulative, level| {
            *cumulative = cumulative.saturating_add(level.size);
            Some(DepthRow {
                price: level.price,
                size: level.size,
                cumulative_size: *cumulative,
            })
        })
        .collect()
}

/// Largest single level size, never below one
///
/// Used as a denominator for relative bar widths, so an empty side yields 1.
pub fn max_size(side: &[PriceLevel]) -> Decimal {
    side.iter().map(|level| level.size).fold(Decimal::ONE, Decimal::max)
}

/// Depth-annotated book ready for display or signal code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthView {
    pub coin: Option<String>,
    pub time: Option<u64>,
    pub bids: Vec<DepthRow>,
    pub asks: Vec<DepthRow>,
    pub bid_max_size: Decimal,
    pub ask_max_size: Decimal,
    pub metrics: BookMetrics,
}

impl DepthView {
    /// Build a view over the top `levels` of each side (all levels if `None`)
    pub fn from_state(state: &OrderBookState, levels: Option<usize>) -> Self {
        let limit = |side: &[PriceLevel]| -> usize { levels.map_or(side.len(), |n| n.min(side.len())) };
        let bids = &state.bids[..limit(&state.bids)];
        let asks = &state.asks[..limit(&state.asks)];

        Self {
            coin: state.coin.clone(),
            time: state.time,
            bids: compute_depth(bids),
            asks: compute_depth(asks),
            bid_max_size: max_size(bids),
            ask_max_size: max_size(asks),
            metrics: BookMetrics::from_state(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn side(levels: &[(Decimal, Decimal)]) -> Vec<PriceLevel> {
        levels
            .iter()
            .map(|&(price, size)| PriceLevel::new(price, size))
            .collect()
    }

    #[test]
    fn test_depth_is_prefix_sum() {
        let asks = side(&[(dec!(101), dec!(1.5)), (dec!(102), dec!(2)), (dec!(103), dec!(0.25))]);
        let depth = compute_depth(&asks);

        let cumulative: Vec<_> = depth.iter().map(|r| r.cumulative_size).collect();
        assert_eq!(cumulative, vec![dec!(1.5), dec!(3.5), dec!(3.75)]);
        let prices: Vec<_> = depth.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![dec!(101), dec!(102), dec!(103)]);
    }

    #[test]
    fn test_depth_keeps_feed_order() {
        let bids = side(&[(dec!(100), dec!(1)), (dec!(102), dec!(2)), (dec!(101), dec!(3))]);
        let depth = compute_depth(&bids);
        assert_eq!(depth[1].price, dec!(102));
        assert_eq!(depth[2].cumulative_size, dec!(6));
    }

    #[test]
    fn test_depth_of_empty_side() {
        assert!(compute_depth(&[]).is_empty());
    }

    #[test]
    fn test_depth_saturates_instead_of_overflowing() {
        let big = Decimal::from_scientific("7e28").unwrap();
        let bids = side(&[(dec!(100), big), (dec!(99), big), (dec!(98), dec!(1))]);

        let depth = compute_depth(&bids);
        assert_eq!(depth[0].cumulative_size, big);
        assert_eq!(depth[1].cumulative_size, Decimal::MAX);
        assert_eq!(depth[2].cumulative_size, Decimal::MAX);
    }

    #[test]
    fn test_max_size() {
        assert_eq!(max_size(&[]), dec!(1));
        assert_eq!(max_size(&side(&[(dec!(10), dec!(5)), (dec!(11), dec!(9))])), dec!(9));
        assert_eq!(max_size(&side(&[(dec!(10), dec!(0.2))])), dec!(1));
    }

    #[test]
    fn test_depth_view_truncates_levels() {
        let state = OrderBookState {
            coin: Some("ETH".to_string()),
            time: Some(5),
            bids: side(&[(dec!(100), dec!(1)), (dec!(99), dec!(4))]),
            asks: side(&[(dec!(101), dec!(2)), (dec!(102), dec!(3)), (dec!(103), dec!(7))]),
        };

        let view = DepthView::from_state(&state, Some(2));
        assert_eq!(view.bids.len(), 2);
        assert_eq!(view.asks.len(), 2);
        assert_eq!(view.asks[1].cumulative_size, dec!(5));
        assert_eq!(view.ask_max_size, dec!(3));
        assert_eq!(view.bid_max_size, dec!(4));

        let full = DepthView::from_state(&state, None);
        assert_eq!(full.asks.len(), 3);
        assert_eq!(full.ask_max_size, dec!(7));
    }
}
