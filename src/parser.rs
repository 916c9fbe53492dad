//! Parser module for exchange WebSocket messages and REST fill documents
//!
//! Book payloads are handed to [`crate::orderbook::normalize`] as raw JSON;
//! this module only routes channels and decodes fills.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{MarketDataError, Result};
use crate::numeric::{decimal_from_json, millis_from_json};
use crate::positions::{Fill, Side};

/// Channel envelope used by every push message
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    pub channel: String,

    #[serde(default)]
    pub data: Value,
}

/// Parsed WebSocket message
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    /// `l2Book` channel payload, still to be normalized
    L2Book(Value),
    /// Acknowledgement of a subscribe/unsubscribe request
    SubscriptionResponse(Value),
    Pong,
    Unknown(String),
}

impl ParsedMessage {
    /// Parse a raw WebSocket message
    ///
    /// Anything that is not a recognised channel envelope becomes
    /// [`ParsedMessage::Unknown`] rather than an error.
    pub fn parse(raw: &str) -> Self {
        let Ok(msg) = serde_json::from_str::<StreamMessage>(raw) else {
            return ParsedMessage::Unknown(raw.to_string());
        };

        match msg.channel.as_str() {
            "l2Book" => ParsedMessage::L2Book(msg.data),
            "subscriptionResponse" => ParsedMessage::SubscriptionResponse(msg.data),
            "pong" => ParsedMessage::Pong,
            _ => ParsedMessage::Unknown(raw.to_string()),
        }
    }
}

/// Fill record as the info endpoint returns it
#[derive(Debug, Clone, Deserialize)]
struct RawFill {
    coin: String,
    side: String,
    #[serde(alias = "size")]
    sz: Value,
    #[serde(alias = "price")]
    px: Value,
    #[serde(alias = "timestamp")]
    time: Value,
    #[serde(default)]
    oid: Option<u64>,
    #[serde(default)]
    cloid: Option<String>,
    #[serde(default)]
    tid: Option<u64>,
    #[serde(default, rename = "closedPnl")]
    closed_pnl: Option<Value>,
}

impl RawFill {
    fn into_fill(self) -> Result<Fill> {
        let timestamp = millis_from_json(&self.time)
            .ok_or_else(|| MarketDataError::malformed_fill(&self.coin, 0, "invalid time"))?;
        let invalid = |field: &str| MarketDataError::malformed_fill(&self.coin, timestamp, format!("invalid {}", field));

        let side = Side::from_feed(&self.side).ok_or_else(|| invalid("side"))?;
        let size = decimal_from_json(&self.sz).ok_or_else(|| invalid("size"))?;
        let price = decimal_from_json(&self.px).ok_or_else(|| invalid("price"))?;
        let closed_pnl = match &self.closed_pnl {
            Some(raw) => Some(decimal_from_json(raw).ok_or_else(|| invalid("closedPnl"))?),
            None => None,
        };

        Ok(Fill {
            coin: self.coin.clone(),
            side,
            size,
            price,
            timestamp,
            order_id: self.oid,
            client_order_id: self.cloid.clone(),
            trade_id: self.tid,
            closed_pnl,
        })
    }
}

/// Fills decoded from one document, plus the records that could not be
#[derive(Debug, Clone, Default)]
pub struct ParsedFills {
    pub fills: Vec<Fill>,
    pub errors: Vec<MarketDataError>,
}

/// Decode a fills document: a bare array, or an object wrapping the array
/// under `fills` or `data`
///
/// Individual bad records are collected in [`ParsedFills::errors`]; only a
/// document with no array at all is an error.
pub fn parse_fills(document: &Value) -> Result<ParsedFills> {
    let records = match document {
        Value::Array(records) => records,
        Value::Object(fields) => fields
            .get("fills")
            .or_else(|| fields.get("data"))
            .and_then(Value::as_array)
            .ok_or_else(|| MarketDataError::ParseError("fills document has no array".to_string()))?,
        _ => {
            return Err(MarketDataError::ParseError(
                "fills document is not an array or object".to_string(),
            ))
        }
    };

    let mut parsed = ParsedFills::default();
    for record in records {
        let fill = serde_json::from_value::<RawFill>(record.clone())
            .map_err(|e| {
                let coin = record.get("coin").and_then(Value::as_str).unwrap_or("?");
                MarketDataError::malformed_fill(coin, 0, e.to_string())
            })
            .and_then(RawFill::into_fill);

        match fill {
            Ok(fill) => parsed.fills.push(fill),
            Err(e) => {
                warn!(error = %e, "Dropping undecodable fill");
                parsed.errors.push(e);
            }
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_l2_book_message() {
        let raw = r#"{
            "channel": "l2Book",
            "data": {
                "coin": "BTC",
                "time": 1672531200000,
                "levels": [
                    [{"px": "50000.0", "sz": "1.5", "n": 2}],
                    [{"px": "50001.0", "sz": "1.0", "n": 1}]
                ]
            }
        }"#;

        match ParsedMessage::parse(raw) {
            ParsedMessage::L2Book(data) => {
                assert_eq!(data["coin"], "BTC");
                assert_eq!(data["levels"].as_array().unwrap().len(), 2);
            }
            other => panic!("Expected L2Book, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_control_messages() {
        assert_eq!(ParsedMessage::parse(r#"{"channel":"pong"}"#), ParsedMessage::Pong);
        assert!(matches!(
            ParsedMessage::parse(
                r#"{"channel":"subscriptionResponse","data":{"method":"subscribe"}}"#
            ),
            ParsedMessage::SubscriptionResponse(_)
        ));
    }

    #[test]
    fn test_unrelated_messages_are_unknown() {
        assert!(matches!(
            ParsedMessage::parse(r#"{"channel":"trades","data":[]}"#),
            ParsedMessage::Unknown(_)
        ));
        assert!(matches!(ParsedMessage::parse("not json"), ParsedMessage::Unknown(_)));
        assert!(matches!(ParsedMessage::parse(r#"{"foo":1}"#), ParsedMessage::Unknown(_)));
    }

    #[test]
    fn test_parse_fills_array() {
        let doc = json!([
            {
                "coin": "ETH", "side": "B", "sz": "1.5", "px": "2000.5",
                "time": 1700000000000u64, "oid": 42, "tid": 7, "closedPnl": "0.0",
                "cloid": "0xabc", "dir": "Open Long", "fee": "0.1"
            },
            { "coin": "ETH", "side": "A", "sz": "1.5", "px": "2010", "time": 1700000005000u64 }
        ]);

        let parsed = parse_fills(&doc).unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.fills.len(), 2);

        let first = &parsed.fills[0];
        assert_eq!(first.side, Side::Buy);
        assert_eq!(first.size, dec!(1.5));
        assert_eq!(first.price, dec!(2000.5));
        assert_eq!(first.order_id, Some(42));
        assert_eq!(first.trade_id, Some(7));
        assert_eq!(first.client_order_id.as_deref(), Some("0xabc"));
        assert_eq!(first.closed_pnl, Some(dec!(0)));
        assert_eq!(parsed.fills[1].side, Side::Sell);
        assert_eq!(parsed.fills[1].closed_pnl, None);
    }

    #[test]
    fn test_parse_wrapped_fills_with_aliases() {
        let doc = json!({
            "fills": [
                { "coin": "SOL", "side": "sell", "size": 2, "price": 25.5, "timestamp": "12" }
            ]
        });

        let parsed = parse_fills(&doc).unwrap();
        assert_eq!(parsed.fills.len(), 1);
        assert_eq!(parsed.fills[0].timestamp, 12);
        assert_eq!(parsed.fills[0].price, dec!(25.5));

        let data_wrapped = json!({ "data": [] });
        assert!(parse_fills(&data_wrapped).unwrap().fills.is_empty());
    }

    #[test]
    fn test_bad_records_are_collected() {
        let doc = json!([
            { "coin": "ETH", "side": "B", "sz": "abc", "px": "1", "time": 1 },
            { "coin": "ETH", "side": "?", "sz": "1", "px": "1", "time": 2 },
            { "coin": "ETH", "sz": "1", "px": "1", "time": 3 },
            { "coin": "ETH", "side": "B", "sz": "1", "px": "1", "time": 4 }
        ]);

        let parsed = parse_fills(&doc).unwrap();
        assert_eq!(parsed.fills.len(), 1);
        assert_eq!(parsed.errors.len(), 3);
        assert!(parsed
            .errors
            .iter()
            .all(|e| matches!(e, MarketDataError::MalformedFill { .. })));
    }

    #[test]
    fn test_document_without_array_is_error() {
        assert!(parse_fills(&json!({ "status": "err" })).is_err());
        assert!(parse_fills(&json!("nope")).is_err());
    }
}
