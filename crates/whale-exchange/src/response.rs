//! Raw response types for the info endpoint.
//!
//! The exchange serializes all numeric fields as strings; conversion to
//! core types parses them into `Decimal` and normalizes signed sizes into
//! `(magnitude, side)` pairs.

use crate::error::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use serde::Deserialize;
use whale_core::{Fill, FillSide, LivePosition, PositionSide};

/// One fill record from the `userFills` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFill {
    /// Instrument identifier.
    pub coin: String,
    /// Execution price as string.
    pub px: String,
    /// Executed size as string.
    pub sz: String,
    /// Side code: "B" (buy) or "A" (sell).
    pub side: String,
    /// Fill timestamp in Unix milliseconds.
    pub time: u64,
    /// Unique trade id.
    pub tid: u64,
}

impl RawFill {
    /// Convert to a core `Fill`.
    pub fn to_fill(&self) -> ExchangeResult<Fill> {
        let side = FillSide::from_code(&self.side)
            .map_err(|e| ExchangeError::ParseError(format!("fill {}: {e}", self.tid)))?;
        let size: Decimal = self
            .sz
            .parse()
            .map_err(|e| ExchangeError::ParseError(format!("fill {} size: {e}", self.tid)))?;
        let price: Decimal = self
            .px
            .parse()
            .map_err(|e| ExchangeError::ParseError(format!("fill {} price: {e}", self.tid)))?;

        Ok(Fill {
            coin: self.coin.clone(),
            side,
            size,
            price,
            time_ms: self.time,
            fill_id: self.tid,
        })
    }
}

/// `clearinghouseState` response.
///
/// Endpoint: POST /info with `{"type": "clearinghouseState", "user": "<address>"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClearinghouseState {
    /// Open positions.
    #[serde(rename = "assetPositions", default)]
    pub asset_positions: Vec<AssetPositionEntry>,
    /// Snapshot timestamp in milliseconds.
    #[serde(default)]
    pub time: Option<u64>,
}

/// Asset position entry from `clearinghouseState`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetPositionEntry {
    /// Position details.
    pub position: RawPositionData,
}

/// Position data within an `AssetPositionEntry`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPositionData {
    /// Instrument identifier.
    pub coin: String,
    /// Signed size (positive = long, negative = short).
    pub szi: String,
    /// Average entry price.
    #[serde(rename = "entryPx")]
    pub entry_px: Option<String>,
    /// Mark price. Not always present; fall back to entry price.
    #[serde(rename = "markPx")]
    pub mark_px: Option<String>,
}

impl RawPositionData {
    /// Convert to a `(coin, LivePosition)` pair.
    ///
    /// Returns `Ok(None)` for a zero-size entry (flat instrument the
    /// exchange still lists).
    pub fn to_live(&self) -> ExchangeResult<Option<(String, LivePosition)>> {
        let szi: Decimal = self
            .szi
            .parse()
            .map_err(|e| ExchangeError::ParseError(format!("{} szi: {e}", self.coin)))?;
        let Some(side) = PositionSide::from_signed_size(szi) else {
            return Ok(None);
        };

        let entry_px = parse_opt_px(self.entry_px.as_deref(), &self.coin, "entryPx")?;
        let mark_px = parse_opt_px(self.mark_px.as_deref(), &self.coin, "markPx")?;

        // Prefer the mark price as reference; the exchange omits it in some
        // snapshot variants, in which case the entry price stands in.
        let current_price = match mark_px {
            Some(px) if px > Decimal::ZERO => px,
            _ => entry_px.unwrap_or(Decimal::ZERO),
        };

        let size = szi.abs();
        Ok(Some((
            self.coin.clone(),
            LivePosition {
                size,
                side,
                value: (size * current_price).abs(),
                avg_price: entry_px.unwrap_or(Decimal::ZERO),
                current_price,
            },
        )))
    }
}

fn parse_opt_px(raw: Option<&str>, coin: &str, field: &str) -> ExchangeResult<Option<Decimal>> {
    raw.map(|s| {
        s.parse()
            .map_err(|e| ExchangeError::ParseError(format!("{coin} {field}: {e}")))
    })
    .transpose()
}
