use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{Fill, PositionRecord, PositionState};
use crate::error::MarketDataError;

/// A fill excluded from reconstruction and why
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFill {
    pub fill: Fill,
    pub error: MarketDataError,
}

/// Completed round-trips plus the fills that were skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    /// Most recently closed first
    pub records: Vec<PositionRecord>,
    pub rejected: Vec<RejectedFill>,
    /// Coins whose history ends with a position still open
    pub open_coins: Vec<String>,
}

/// Rebuild closed positions from a fill history
///
/// Positions still open at the end of the history are not reported.
pub fn reconstruct(fills: &[Fill]) -> Vec<PositionRecord> {
    reconstruct_with_report(fills).records
}

/// Like [`reconstruct`], also reporting rejected fills and open coins
pub fn reconstruct_with_report(fills: &[Fill]) -> Reconstruction {
    let mut by_coin: BTreeMap<&str, Vec<&Fill>> = BTreeMap::new();
    for fill in fills {
        by_coin.entry(fill.coin.as_str()).or_default().push(fill);
    }

    let mut report = Reconstruction::default();

    for (coin, mut coin_fills) in by_coin {
        // Stable: equal timestamps keep delivery order
        coin_fills.sort_by_key(|fill| fill.timestamp);

        let last = coin_fills.into_iter().fold(PositionState::Flat, |state, fill| {
            let step = fill.validate().and_then(|()| {
                state
                    .apply(fill.signed_size(), fill.price, fill.timestamp)
                    .ok_or_else(|| {
                        MarketDataError::malformed_fill(coin, fill.timestamp, "arithmetic overflow")
                    })
            });

            match step {
                Ok(step) => {
                    if let Some(trip) = step.closed {
                        report.records.push(PositionRecord::from_round_trip(coin, trip));
                    }
                    step.state
                }
                Err(error) => {
                    warn!(coin = %coin, timestamp = fill.timestamp, error = %error, "Skipping fill");
                    report.rejected.push(RejectedFill {
                        fill: fill.clone(),
                        error,
                    });
                    state
                }
            }
        });

        if let PositionState::Open(pos) = last {
            debug!(
                coin = %coin,
                size = %pos.signed_size,
                opened_at = pos.opened_at,
                "Position still open at end of history"
            );
            report.open_coins.push(coin.to_string());
        }
    }

    report
        .records
        .sort_by(|a, b| b.close_timestamp.cmp(&a.close_timestamp));

    debug!(
        fills = fills.len(),
        records = report.records.len(),
        rejected = report.rejected.len(),
        "Reconstructed positions"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::{Direction, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn buy(coin: &str, size: Decimal, price: Decimal, t: u64) -> Fill {
        Fill::new(coin, Side::Buy, size, price, t)
    }

    fn sell(coin: &str, size: Decimal, price: Decimal, t: u64) -> Fill {
        Fill::new(coin, Side::Sell, size, price, t)
    }

    #[test]
    fn test_round_trip_long() {
        let records = reconstruct(&[
            buy("ETH", dec!(1), dec!(100), 0),
            sell("ETH", dec!(1), dec!(110), 10),
        ]);

        assert_eq!(
            records,
            vec![PositionRecord {
                coin: "ETH".to_string(),
                direction: Direction::Long,
                open_timestamp: 0,
                close_timestamp: 10,
                duration_ms: 10,
                realized_pnl_usd: dec!(10),
            }]
        );
    }

    #[test]
    fn test_averaged_entry() {
        let records = reconstruct(&[
            buy("ETH", dec!(1), dec!(100), 0),
            buy("ETH", dec!(1), dec!(120), 5),
            sell("ETH", dec!(2), dec!(130), 10),
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].realized_pnl_usd, dec!(40));
        assert_eq!(records[0].open_timestamp, 0);
        assert_eq!(records[0].duration_ms, 10);
    }

    #[test]
    fn test_scaling_out_accumulates_pnl() {
        let records = reconstruct(&[
            sell("BTC", dec!(2), dec!(100), 0),
            buy("BTC", dec!(1), dec!(90), 5),
            buy("BTC", dec!(1), dec!(105), 9),
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].direction, Direction::Short);
        // +10 on the first unit, -5 on the second
        assert_eq!(records[0].realized_pnl_usd, dec!(5));
        assert_eq!(records[0].close_timestamp, 9);
    }

    #[test]
    fn test_invalid_fills_leave_state_untouched() {
        let clean = vec![
            buy("ETH", dec!(1), dec!(100), 0),
            sell("ETH", dec!(1), dec!(110), 10),
        ];
        let noisy = vec![
            buy("ETH", dec!(1), dec!(100), 0),
            buy("ETH", dec!(0), dec!(50), 3),
            sell("ETH", dec!(1), dec!(0), 4),
            sell("ETH", dec!(1), dec!(-20), 5),
            sell("ETH", dec!(1), dec!(110), 10),
        ];

        let report = reconstruct_with_report(&noisy);
        assert_eq!(report.rejected.len(), 3);
        assert!(report
            .rejected
            .iter()
            .all(|r| matches!(r.error, MarketDataError::MalformedFill { .. })));
        assert_eq!(report.records, reconstruct(&clean));
    }

    #[test]
    fn test_overflowing_fills_are_rejected_without_aborting() {
        let huge = Decimal::from_scientific("1e20").unwrap();
        let price = Decimal::from_scientific("1e10").unwrap();

        let report = reconstruct_with_report(&[
            buy("BTC", huge, price, 0),
            buy("BTC", huge, price, 1),
            sell("BTC", huge * dec!(2), price, 2),
            buy("ETH", dec!(1), dec!(100), 0),
            sell("ETH", dec!(1), dec!(110), 10),
        ]);

        assert_eq!(report.rejected.len(), 3);
        assert!(report.rejected.iter().all(|r| r.fill.coin == "BTC"
            && matches!(&r.error, MarketDataError::MalformedFill { reason, .. }
                if reason == "arithmetic overflow")));
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].coin, "ETH");
        assert_eq!(report.records[0].realized_pnl_usd, dec!(10));
        assert!(report.open_coins.is_empty());
    }

    #[test]
    fn test_overflow_keeps_prior_position() {
        let huge = Decimal::from_scientific("1e20").unwrap();
        let price = Decimal::from_scientific("1e10").unwrap();
        let report = reconstruct_with_report(&[
            buy("BTC", dec!(2), dec!(100), 0),
            buy("BTC", huge, price, 1),
            sell("BTC", dec!(2), dec!(105), 2),
        ]);

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].fill.timestamp, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].realized_pnl_usd, dec!(10));
    }

    #[test]
    fn test_repeating_average_closes_exactly() {
        let records = reconstruct(&[
            buy("ETH", dec!(1), dec!(100), 0),
            buy("ETH", dec!(2), dec!(101), 1),
            sell("ETH", dec!(3), dec!(101), 2),
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].realized_pnl_usd, dec!(1));
    }

    #[test]
    fn test_open_positions_are_dropped() {
        let report = reconstruct_with_report(&[
            buy("ETH", dec!(1), dec!(100), 0),
            sell("ETH", dec!(1), dec!(110), 10),
            buy("SOL", dec!(5), dec!(20), 11),
            buy("ETH", dec!(2), dec!(105), 12),
        ]);

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].coin, "ETH");
        assert_eq!(report.open_coins, vec!["ETH".to_string(), "SOL".to_string()]);
    }

    #[test]
    fn test_most_recent_close_first() {
        let records = reconstruct(&[
            buy("ETH", dec!(1), dec!(100), 0),
            sell("ETH", dec!(1), dec!(101), 5),
            sell("BTC", dec!(1), dec!(100), 1),
            buy("BTC", dec!(1), dec!(99), 20),
        ]);

        let closes: Vec<_> = records.iter().map(|r| r.close_timestamp).collect();
        assert_eq!(closes, vec![20, 5]);
        assert_eq!(records[0].coin, "BTC");
    }

    #[test]
    fn test_fills_sorted_per_coin() {
        // Delivered out of order; reconstruction sorts by time
        let records = reconstruct(&[
            sell("ETH", dec!(1), dec!(110), 10),
            buy("ETH", dec!(1), dec!(100), 0),
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].direction, Direction::Long);
        assert_eq!(records[0].realized_pnl_usd, dec!(10));
    }

    #[test]
    fn test_equal_timestamps_keep_delivery_order() {
        let records = reconstruct(&[
            buy("ETH", dec!(1), dec!(100), 7),
            sell("ETH", dec!(1), dec!(104), 7),
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].direction, Direction::Long);
        assert_eq!(records[0].duration_ms, 0);
    }

    #[test]
    fn test_flip_through_zero() {
        let records = reconstruct(&[
            buy("ETH", dec!(1), dec!(100), 0),
            sell("ETH", dec!(3), dec!(110), 10),
            buy("ETH", dec!(2), dec!(100), 30),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::Short);
        assert_eq!(records[0].open_timestamp, 10);
        assert_eq!(records[0].close_timestamp, 30);
        assert_eq!(records[0].realized_pnl_usd, dec!(20));
        assert_eq!(records[1].direction, Direction::Long);
        assert_eq!(records[1].realized_pnl_usd, dec!(10));
    }

    #[test]
    fn test_empty_history() {
        assert!(reconstruct(&[]).is_empty());
    }
}
