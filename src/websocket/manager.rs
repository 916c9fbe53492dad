//! WebSocket connection manager
//!
//! Handles reconnection, coin switching and message dispatch. Every book that
//! reaches the shared state replaces the previous one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use super::{CoinSession, SnapshotTicket, WebSocketClient};
use crate::error::{MarketDataError, Result};
use crate::metrics::{BOOK_UPDATES, IGNORED_MESSAGES, MALFORMED_PAYLOADS, STALE_SNAPSHOTS};
use crate::orderbook::{normalize, BookMetrics, OrderBookState};
use crate::parser::ParsedMessage;
use crate::AppState;

/// Maximum backoff delay in milliseconds (60 seconds)
const MAX_BACKOFF_MS: u64 = 60_000;
/// Cooldown period after which reconnect attempts are reset (5 minutes)
const RECONNECT_COOLDOWN_SECS: u64 = 300;
const KEEPALIVE_SECS: u64 = 30;
const RECV_TIMEOUT_SECS: u64 = 45;

type SnapshotResult = (SnapshotTicket, Result<Value>);

/// Manages the book stream with automatic reconnection
pub struct WebSocketManager {
    state: Arc<AppState>,
    client: WebSocketClient,
    session: CoinSession,
    coin_rx: watch::Receiver<String>,
    snapshot_tx: mpsc::Sender<SnapshotResult>,
    snapshot_rx: mpsc::Receiver<SnapshotResult>,
    reconnect_attempts: u32,
    last_successful_connection: Option<Instant>,
}

impl WebSocketManager {
    /// Create a new WebSocket manager
    pub fn new(state: Arc<AppState>) -> Self {
        let client = WebSocketClient::new(&state.config.ws_endpoint);
        let mut coin_rx = state.coin_tx.subscribe();
        let session = CoinSession::new(&coin_rx.borrow_and_update());
        let (snapshot_tx, snapshot_rx) = mpsc::channel(16);

        Self {
            state,
            client,
            session,
            coin_rx,
            snapshot_tx,
            snapshot_rx,
            reconnect_attempts: 0,
            last_successful_connection: None,
        }
    }

    /// Run the WebSocket manager - runs indefinitely with automatic reconnection
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting WebSocket manager with infinite retry");
        self.spawn_status_logger();

        loop {
            // Reset reconnect attempts if we've been stable for a while
            if let Some(last_success) = self.last_successful_connection {
                if last_success.elapsed() > Duration::from_secs(RECONNECT_COOLDOWN_SECS)
                    && self.reconnect_attempts > 0
                {
                    info!(
                        previous_attempts = self.reconnect_attempts,
                        "Resetting reconnect counter after cooldown period"
                    );
                    self.reconnect_attempts = 0;
                }
            }

            match self.connect_and_process().await {
                Ok(()) => {
                    info!("WebSocket processing completed normally, reconnecting...");
                    sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    error!(error = %e, "WebSocket error");
                    self.client.close().await;
                    self.reconnect_attempts += 1;

                    let base_delay = self.state.config.reconnect_delay_ms
                        * 2u64.pow(self.reconnect_attempts.min(6));
                    let delay = Duration::from_millis(base_delay.min(MAX_BACKOFF_MS));

                    warn!(
                        attempt = self.reconnect_attempts,
                        delay_secs = delay.as_secs(),
                        "Reconnecting after error..."
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Connect, subscribe to the active coin and process messages
    async fn connect_and_process(&mut self) -> Result<()> {
        self.client.connect().await?;

        self.last_successful_connection = Some(Instant::now());
        self.reconnect_attempts = 0;
        info!("WebSocket connected successfully, resetting reconnect counter");

        // A switch may have been requested while we were disconnected
        let requested = self.coin_rx.borrow_and_update().clone();
        if let Some(previous) = self.session.switch(&requested) {
            info!(from = %previous, to = %requested, "Coin changed while disconnected");
            self.clear_book().await;
        }

        self.client.subscribe(self.session.coin()).await?;
        self.spawn_snapshot_fetch();

        let mut last_message = Instant::now();
        let keepalive = Duration::from_secs(KEEPALIVE_SECS);
        let recv_timeout = Duration::from_secs(RECV_TIMEOUT_SECS);

        loop {
            tokio::select! {
                changed = self.coin_rx.changed() => {
                    if changed.is_err() {
                        return Err(MarketDataError::WebSocketConnection(
                            "Coin selector closed".to_string(),
                        ));
                    }
                    let coin = self.coin_rx.borrow_and_update().clone();
                    self.switch_coin(&coin).await?;
                }
                Some((ticket, result)) = self.snapshot_rx.recv() => {
                    self.handle_snapshot(ticket, result).await;
                }
                received = timeout(recv_timeout, self.client.recv()) => match received {
                    Ok(Ok(Some(text))) => {
                        last_message = Instant::now();
                        if let Err(e) = self.process_message(&text).await {
                            warn!(error = %e, "Failed to process message");
                        }
                    }
                    Ok(Ok(None)) => {
                        if last_message.elapsed() > keepalive {
                            if let Err(e) = self.client.ping().await {
                                warn!(error = %e, "Failed to send keepalive ping");
                            }
                        }
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        warn!(
                            last_message_secs = last_message.elapsed().as_secs(),
                            "No message received within timeout, sending keepalive"
                        );
                        if let Err(e) = self.client.ping().await {
                            warn!(error = %e, "Failed to send keepalive ping, reconnecting");
                            return Err(MarketDataError::ConnectionTimeout);
                        }
                    }
                },
            }
        }
    }

    /// Move the live subscription to `coin` and request a fresh snapshot
    async fn switch_coin(&mut self, coin: &str) -> Result<()> {
        let Some(previous) = self.session.switch(coin) else {
            return Ok(());
        };

        info!(
            from = %previous,
            to = %coin,
            generation = self.session.generation(),
            "Switching coin"
        );

        self.clear_book().await;
        self.client.unsubscribe(&previous).await?;
        self.client.subscribe(coin).await?;
        self.spawn_snapshot_fetch();
        Ok(())
    }

    /// Fetch the active coin's snapshot without blocking the stream
    fn spawn_snapshot_fetch(&self) {
        let ticket = self.session.ticket();
        let info = self.state.info_client.clone();
        let tx = self.snapshot_tx.clone();

        tokio::spawn(async move {
            let result = info.l2_snapshot(&ticket.coin).await;
            let _ = tx.send((ticket, result)).await;
        });
    }

    async fn handle_snapshot(&self, ticket: SnapshotTicket, result: Result<Value>) {
        if !self.session.accepts_snapshot(&ticket) {
            STALE_SNAPSHOTS.inc();
            debug!(
                coin = %ticket.coin,
                generation = ticket.generation,
                "Discarding snapshot for inactive coin"
            );
            return;
        }

        match result.and_then(|payload| normalize(&payload)) {
            Ok(Some(mut book)) => {
                book.coin.get_or_insert_with(|| ticket.coin.clone());
                info!(coin = %ticket.coin, "Order book initialized from snapshot");
                self.apply_book(book).await;
            }
            Ok(None) => warn!(coin = %ticket.coin, "Snapshot response carried no book"),
            Err(e) => {
                if matches!(e, MarketDataError::MalformedPayload(_)) {
                    MALFORMED_PAYLOADS.inc();
                }
                warn!(coin = %ticket.coin, error = %e, "Snapshot load failed");
            }
        }
    }

    /// Process a single WebSocket message
    async fn process_message(&self, raw: &str) -> Result<()> {
        match ParsedMessage::parse(raw) {
            ParsedMessage::L2Book(data) => match normalize(&data) {
                Ok(Some(mut book)) => {
                    if !self.session.accepts_stream(&book) {
                        IGNORED_MESSAGES.inc();
                        trace!(coin = ?book.coin, "Book for inactive coin");
                        return Ok(());
                    }
                    book.coin
                        .get_or_insert_with(|| self.session.coin().to_string());
                    self.apply_book(book).await;
                }
                Ok(None) => ignore(MarketDataError::UnrecognizedMessage(
                    "l2Book payload without levels".to_string(),
                )),
                Err(e) => {
                    MALFORMED_PAYLOADS.inc();
                    return Err(e);
                }
            },
            ParsedMessage::SubscriptionResponse(data) => {
                debug!(response = %data, "Subscription acknowledged");
            }
            ParsedMessage::Pong => trace!("Pong received"),
            ParsedMessage::Unknown(msg) => ignore(MarketDataError::UnrecognizedMessage(msg)),
        }

        Ok(())
    }

    async fn apply_book(&self, book: OrderBookState) {
        debug!(
            coin = ?book.coin,
            bids = book.bids.len(),
            asks = book.asks.len(),
            "Order book replaced"
        );
        *self.state.book.write().await = Some(book);
        BOOK_UPDATES.inc();
    }

    async fn clear_book(&self) {
        *self.state.book.write().await = None;
    }

    fn spawn_status_logger(&self) {
        let state = self.state.clone();
        let period = Duration::from_secs(state.config.health_check_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let guard = state.book.read().await;
                let Some(book) = guard.as_ref() else {
                    continue;
                };
                let metrics = BookMetrics::from_state(book);
                if let Some(mid) = metrics.mid_price {
                    info!(
                        coin = ?book.coin,
                        mid_price = %mid,
                        spread_bps = ?metrics.spread_bps,
                        imbalance = ?metrics.imbalance,
                        "Order book status"
                    );
                }
            }
        });
    }
}

fn ignore(reason: MarketDataError) {
    IGNORED_MESSAGES.inc();
    trace!(reason = %reason, "Message ignored");
}
