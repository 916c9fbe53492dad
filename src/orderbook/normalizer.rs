//! Payload normalization
//!
//! Two payload shapes reach the normalizer:
//!
//! * snapshot: `{coin, time, levels: [[{px, sz, n}, ..], [{px, sz, n}, ..]]}`
//!   with string encoded numbers (REST `l2Book` and the `l2Book` channel)
//! * full-ladder update: `{bids: [[px, sz], ..], asks: [[px, sz], ..]}` with
//!   numeric pairs
//!
//! Anything else is not a book and yields `Ok(None)`.

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::trace;

use super::{BookSide, OrderBookState, PriceLevel};
use crate::error::{MarketDataError, Result};
use crate::numeric::{decimal_from_json, millis_from_json};

/// Convert a raw book payload into an [`OrderBookState`]
///
/// Returns `Ok(None)` when the payload matches neither book shape, so callers
/// sharing a transport with other message types can skip it. Unparseable
/// numbers are reported as [`MarketDataError::MalformedPayload`].
pub fn normalize(payload: &Value) -> Result<Option<OrderBookState>> {
    let Some(fields) = payload.as_object() else {
        return Ok(None);
    };

    let (bids, asks) = if let Some(levels) = fields.get("levels") {
        parse_levels(levels)?
    } else if let (Some(bids), Some(asks)) = (fields.get("bids"), fields.get("asks")) {
        (parse_pairs("bids", bids)?, parse_pairs("asks", asks)?)
    } else {
        trace!("Payload carries no book levels");
        return Ok(None);
    };
    check_total("bids", &bids)?;
    check_total("asks", &asks)?;

    Ok(Some(OrderBookState {
        coin: fields.get("coin").and_then(Value::as_str).map(str::to_string),
        time: fields.get("time").and_then(millis_from_json),
        bids,
        asks,
    }))
}

/// Snapshot form: exactly two ladders of `{px, sz, n}` objects
fn parse_levels(levels: &Value) -> Result<(BookSide, BookSide)> {
    let sides = levels
        .as_array()
        .filter(|sides| sides.len() == 2)
        .ok_or_else(|| malformed("levels must be a [bids, asks] pair"))?;

    Ok((parse_objects("bids", &sides[0])?, parse_objects("asks", &sides[1])?))
}

fn parse_objects(name: &str, side: &Value) -> Result<BookSide> {
    let entries = side
        .as_array()
        .ok_or_else(|| malformed(format!("{} ladder is not an array", name)))?;

    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| level(name, i, entry.get("px"), entry.get("sz")).transpose())
        .collect()
}

/// Update form: a ladder of `[price, size]` pairs
fn parse_pairs(name: &str, side: &Value) -> Result<BookSide> {
    let entries = side
        .as_array()
        .ok_or_else(|| malformed(format!("{} is not an array", name)))?;

    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let pair = match entry.as_array() {
                Some(pair) if pair.len() == 2 => pair,
                _ => {
                    return Some(Err(malformed(format!(
                        "{}[{}] is not a [price, size] pair",
                        name, i
                    ))))
                }
            };
            level(name, i, pair.first(), pair.get(1)).transpose()
        })
        .collect()
}

/// Build one level; zero size means the level is gone and is skipped
fn level(
    side: &str,
    index: usize,
    price: Option<&Value>,
    size: Option<&Value>,
) -> Result<Option<PriceLevel>> {
    let price = price
        .and_then(decimal_from_json)
        .ok_or_else(|| malformed(format!("{}[{}] has an invalid price", side, index)))?;
    let size = size
        .and_then(decimal_from_json)
        .ok_or_else(|| malformed(format!("{}[{}] has an invalid size", side, index)))?;

    if size < Decimal::ZERO {
        return Err(malformed(format!("{}[{}] has a negative size", side, index)));
    }
    if size.is_zero() {
        return Ok(None);
    }
    Ok(Some(PriceLevel::new(price, size)))
}

/// A side whose total size does not fit in a `Decimal` cannot be depth-summed
fn check_total(name: &str, side: &[PriceLevel]) -> Result<()> {
    side.iter()
        .try_fold(Decimal::ZERO, |total, level| total.checked_add(level.size))
        .map(|_| ())
        .ok_or_else(|| malformed(format!("{} total size overflows", name)))
}

fn malformed(reason: impl Into<String>) -> MarketDataError {
    MarketDataError::MalformedPayload(reason.into())
}
