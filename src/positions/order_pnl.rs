//! Realized P&L grouped by exchange order id
//!
//! An alternate view that trusts the exchange's own `closedPnl` per fill
//! instead of recomputing it. It is only available when the feed sends both
//! an order id and a closed P&L, and it is never mixed into [`reconstruct`].
//!
//! [`reconstruct`]: super::reconstruct

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Fill, Side};

/// Aggregate of all fills belonging to one order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPnl {
    pub coin: String,
    pub order_id: u64,
    pub side: Side,
    pub size: Decimal,
    pub closed_pnl: Decimal,
    pub fills: usize,
    pub first_timestamp: u64,
    pub last_timestamp: u64,
}

/// Group fills by `(coin, order_id)` and sum the exchange-reported P&L
///
/// Output is ordered by the order's last fill, most recent first.
pub fn summarize_by_order(fills: &[Fill]) -> Vec<OrderPnl> {
    let mut orders: HashMap<(&str, u64), OrderPnl> = HashMap::new();

    for fill in fills {
        let (Some(order_id), Some(closed_pnl)) = (fill.order_id, fill.closed_pnl) else {
            continue;
        };

        orders
            .entry((fill.coin.as_str(), order_id))
            .and_modify(|order| {
                order.size = order.size.saturating_add(fill.size);
                order.closed_pnl = order.closed_pnl.saturating_add(closed_pnl);
                order.fills += 1;
                order.first_timestamp = order.first_timestamp.min(fill.timestamp);
                order.last_timestamp = order.last_timestamp.max(fill.timestamp);
            })
            .or_insert_with(|| OrderPnl {
                coin: fill.coin.clone(),
                order_id,
                side: fill.side,
                size: fill.size,
                closed_pnl,
                fills: 1,
                first_timestamp: fill.timestamp,
                last_timestamp: fill.timestamp,
            });
    }

    let mut summaries: Vec<OrderPnl> = orders.into_values().collect();
    summaries.sort_by(|a, b| {
        b.last_timestamp
            .cmp(&a.last_timestamp)
            .then_with(|| a.coin.cmp(&b.coin))
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
    summaries
}
