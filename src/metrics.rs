//! Prometheus counters exposed on `/metrics`

use std::sync::LazyLock;

use prometheus::{Encoder, IntCounter, TextEncoder};
use tracing::warn;

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("static metric name is valid");
    if let Err(e) = prometheus::register(Box::new(counter.clone())) {
        warn!(metric = name, error = %e, "Failed to register metric");
    }
    counter
}

pub static BOOK_UPDATES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter("perp_flow_book_updates_total", "Order book states applied")
});

pub static STALE_SNAPSHOTS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "perp_flow_stale_snapshots_total",
        "Snapshot responses discarded after a coin switch",
    )
});

pub static IGNORED_MESSAGES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "perp_flow_ignored_messages_total",
        "Stream messages that carried no book for the active coin",
    )
});

pub static MALFORMED_PAYLOADS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter("perp_flow_malformed_payloads_total", "Book payloads that failed to parse")
});

pub static REJECTED_FILLS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter("perp_flow_rejected_fills_total", "Fills excluded from reconstruction")
});

pub static RECONSTRUCTIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter("perp_flow_reconstructions_total", "Position reconstructions run")
});

/// Register every counter so `/metrics` lists them before first use
pub fn register_all() {
    for counter in [
        &BOOK_UPDATES,
        &STALE_SNAPSHOTS,
        &IGNORED_MESSAGES,
        &MALFORMED_PAYLOADS,
        &REJECTED_FILLS,
        &RECONSTRUCTIONS,
    ] {
        LazyLock::force(counter);
    }
}

/// Render the default registry in the text exposition format
pub fn render() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
