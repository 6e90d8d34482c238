//! HTTP client for the exchange info endpoint.
//!
//! One client per tracked account: the account address is part of the
//! client so capability traits (`PositionSource`) need no extra context.

use crate::error::{ExchangeError, ExchangeResult};
use crate::response::{ClearinghouseState, RawFill};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use whale_core::{Fill, PositionMap, PositionSource, SourceError};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on fills taken from one `userFills` response.
const MAX_RECENT_FILLS: usize = 100;

/// Request type for info endpoint.
#[derive(Debug, Serialize)]
struct InfoRequest {
    #[serde(rename = "type")]
    request_type: String,
}

/// Request type for info endpoint with user address.
#[derive(Debug, Serialize)]
struct UserInfoRequest {
    #[serde(rename = "type")]
    request_type: String,
    /// Account address (0x...).
    user: String,
}

/// Client for the exchange info endpoint, bound to one tracked account.
pub struct InfoClient {
    client: Client,
    info_url: String,
    user: String,
}

impl InfoClient {
    /// Create a new info client.
    ///
    /// # Arguments
    /// * `info_url` - URL of the info endpoint (e.g., "https://api.hyperliquid.xyz/info")
    /// * `user` - tracked account address
    pub fn new(info_url: impl Into<String>, user: impl Into<String>) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            info_url: info_url.into(),
            user: user.into(),
        })
    }

    /// Tracked account address.
    pub fn user(&self) -> &str {
        &self.user
    }

    async fn post_info<B: Serialize>(&self, body: &B) -> ExchangeResult<serde_json::Value> {
        let response = self
            .client
            .post(&self.info_url)
            .json(body)
            .send()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to parse response: {e}")))
    }

    /// Probe the info endpoint (`{"type": "meta"}`).
    ///
    /// Used once at startup to distinguish "exchange reachable" from
    /// maintenance windows; the tracker starts either way.
    pub async fn probe(&self) -> ExchangeResult<()> {
        let request = InfoRequest {
            request_type: "meta".to_string(),
        };
        self.post_info(&request).await.map(|_| ())
    }

    /// Fetch the account's most recent fills (bounded to 100).
    ///
    /// Individual fills that fail to decode are skipped with a warning
    /// rather than failing the whole poll.
    pub async fn fetch_recent_fills(&self) -> ExchangeResult<Vec<Fill>> {
        let request = UserInfoRequest {
            request_type: "userFills".to_string(),
            user: self.user.clone(),
        };

        let body = self.post_info(&request).await?;
        let entries = body
            .as_array()
            .ok_or_else(|| ExchangeError::ParseError("userFills response is not an array".into()))?;

        let mut fills = Vec::with_capacity(entries.len().min(MAX_RECENT_FILLS));
        for entry in entries.iter().take(MAX_RECENT_FILLS) {
            let raw: RawFill = match serde_json::from_value(entry.clone()) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(?e, "Skipping undecodable fill entry");
                    continue;
                }
            };
            match raw.to_fill() {
                Ok(fill) => fills.push(fill),
                Err(e) => warn!(%e, "Skipping unparseable fill"),
            }
        }

        debug!(count = fills.len(), "Fetched recent fills");
        Ok(fills)
    }

    /// Fetch the account's current positions from clearinghouse state.
    ///
    /// An `Ok` empty map is ambiguous evidence (truly flat or a data gap);
    /// callers decide per the reconciliation rules.
    pub async fn fetch_positions(&self) -> ExchangeResult<PositionMap> {
        let request = UserInfoRequest {
            request_type: "clearinghouseState".to_string(),
            user: self.user.clone(),
        };

        let body = self.post_info(&request).await?;
        let state: ClearinghouseState = serde_json::from_value(body)?;

        let mut positions = PositionMap::new();
        for entry in &state.asset_positions {
            match entry.position.to_live() {
                Ok(Some((coin, live))) => {
                    positions.insert(coin, live);
                }
                Ok(None) => {}
                Err(e) => warn!(%e, coin = %entry.position.coin, "Skipping unparseable position"),
            }
        }

        debug!(count = positions.len(), "Fetched position snapshot");
        Ok(positions)
    }

    /// Fetch the current mid price for one instrument via `allMids`.
    ///
    /// Returns `None` when the instrument is missing or priced at zero.
    pub async fn fetch_mid_price(&self, coin: &str) -> ExchangeResult<Option<Decimal>> {
        let request = InfoRequest {
            request_type: "allMids".to_string(),
        };

        let body = self.post_info(&request).await?;
        let mids: HashMap<String, String> = serde_json::from_value(body)?;

        let Some(raw) = mids.get(coin) else {
            return Ok(None);
        };
        let price: Decimal = raw
            .parse()
            .map_err(|e| ExchangeError::ParseError(format!("{coin} mid: {e}")))?;

        Ok((price > Decimal::ZERO).then_some(price))
    }
}

#[async_trait]
impl PositionSource for InfoClient {
    async fn current_positions(&self) -> Result<PositionMap, SourceError> {
        self.fetch_positions().await.map_err(|e| match e {
            ExchangeError::Json(e) => SourceError::Decode(e.to_string()),
            ExchangeError::ParseError(msg) => SourceError::Decode(msg),
            other => SourceError::Transport(other.to_string()),
        })
    }
}
