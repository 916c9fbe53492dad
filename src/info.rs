//! REST client for the exchange `info` endpoint
//!
//! Fetches book snapshots and account fill histories. Responses are returned
//! as decoded JSON or fills; normalization and reconstruction happen in the
//! caller.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::Result;
use crate::parser::{parse_fills, ParsedFills};

/// Client for `POST {endpoint}` info requests
#[derive(Debug, Clone)]
pub struct InfoClient {
    http: reqwest::Client,
    endpoint: String,
}

impl InfoClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Fetch an `l2Book` snapshot payload for `coin`
    pub async fn l2_snapshot(&self, coin: &str) -> Result<Value> {
        info!(coin = %coin, endpoint = %self.endpoint, "Fetching order book snapshot");
        self.post(json!({ "type": "l2Book", "coin": coin })).await
    }

    /// Fetch and decode the full fill history of `account`
    pub async fn user_fills(&self, account: &str) -> Result<ParsedFills> {
        info!(account = %account, "Fetching fills");
        let document = self.post(json!({ "type": "userFills", "user": account })).await?;
        let parsed = parse_fills(&document)?;
        debug!(
            account = %account,
            fills = parsed.fills.len(),
            undecodable = parsed.errors.len(),
            "Fills decoded"
        );
        Ok(parsed)
    }

    async fn post(&self, body: Value) -> Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(response)
    }
}
