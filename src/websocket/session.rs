//! Active-coin bookkeeping for the book stream
//!
//! Every coin switch starts a new generation. Snapshot fetches carry the
//! generation they were started under, so a response for a coin the consumer
//! has already left is recognised and dropped.

use crate::orderbook::OrderBookState;

/// Identifies the coin and generation a snapshot request belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTicket {
    pub coin: String,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct CoinSession {
    coin: String,
    generation: u64,
}

impl CoinSession {
    pub fn new(coin: &str) -> Self {
        Self {
            coin: coin.to_string(),
            generation: 0,
        }
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Make `coin` active. Returns the previous coin, or `None` when `coin`
    /// was already active and nothing changed.
    pub fn switch(&mut self, coin: &str) -> Option<String> {
        if coin == self.coin {
            return None;
        }
        self.generation += 1;
        Some(std::mem::replace(&mut self.coin, coin.to_string()))
    }

    pub fn ticket(&self) -> SnapshotTicket {
        SnapshotTicket {
            coin: self.coin.clone(),
            generation: self.generation,
        }
    }

    /// A snapshot is current only if nothing switched since it was requested
    pub fn accepts_snapshot(&self, ticket: &SnapshotTicket) -> bool {
        ticket.generation == self.generation && ticket.coin == self.coin
    }

    /// Streamed books without a coin are assumed to be for the active coin
    pub fn accepts_stream(&self, book: &OrderBookState) -> bool {
        book.coin.as_deref().map_or(true, |coin| coin == self.coin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(coin: Option<&str>) -> OrderBookState {
        OrderBookState {
            coin: coin.map(str::to_string),
            time: None,
            bids: vec![],
            asks: vec![],
        }
    }

    #[test]
    fn test_switch_bumps_generation() {
        let mut session = CoinSession::new("BTC");
        assert_eq!(session.switch("BTC"), None);
        assert_eq!(session.generation(), 0);

        assert_eq!(session.switch("ETH"), Some("BTC".to_string()));
        assert_eq!(session.coin(), "ETH");
        assert_eq!(session.generation(), 1);
    }

    #[test]
    fn test_stale_snapshot_is_rejected() {
        let mut session = CoinSession::new("BTC");
        let btc = session.ticket();
        assert!(session.accepts_snapshot(&btc));

        session.switch("ETH");
        assert!(!session.accepts_snapshot(&btc));
        assert!(session.accepts_snapshot(&session.ticket()));
    }

    #[test]
    fn test_switching_back_does_not_revive_old_requests() {
        let mut session = CoinSession::new("BTC");
        let first = session.ticket();
        session.switch("ETH");
        session.switch("BTC");
        assert!(!session.accepts_snapshot(&first));
    }

    #[test]
    fn test_stream_coin_filter() {
        let session = CoinSession::new("BTC");
        assert!(session.accepts_stream(&book(Some("BTC"))));
        assert!(session.accepts_stream(&book(None)));
        assert!(!session.accepts_stream(&book(Some("ETH"))));
    }
}
