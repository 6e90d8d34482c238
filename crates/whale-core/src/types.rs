//! Fill, position, and transition types.
//!
//! `Position` is the tracker's locally maintained belief about one open
//! position. `LivePosition` is one entry of the authoritative snapshot
//! fetched from the exchange (ground truth). The two are reconciled by
//! `whale-tracker`; a reconciliation step always produces exactly one
//! `Transition`.

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Derive the side from a signed exchange size (`szi`).
    ///
    /// Returns `None` for a zero size (no position).
    pub fn from_signed_size(szi: Decimal) -> Option<Self> {
        if szi.is_zero() {
            None
        } else if szi.is_sign_positive() {
            Some(Self::Long)
        } else {
            Some(Self::Short)
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Direction of a single fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FillSide {
    Buy,
    Sell,
}

impl FillSide {
    /// Parse the exchange's one-letter side code ("B" = buy, "A" = sell).
    pub fn from_code(code: &str) -> Result<Self, CoreError> {
        match code {
            "B" => Ok(Self::Buy),
            "A" | "S" => Ok(Self::Sell),
            other => Err(CoreError::InvalidSide(other.to_string())),
        }
    }
}

impl fmt::Display for FillSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// One executed trade record from the fill feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Instrument identifier (e.g., "BTC").
    pub coin: String,
    /// Fill direction.
    pub side: FillSide,
    /// Executed size (positive magnitude).
    pub size: Decimal,
    /// Execution price.
    pub price: Decimal,
    /// Fill timestamp in Unix milliseconds.
    pub time_ms: u64,
    /// Unique fill identifier, used for de-duplication.
    pub fill_id: u64,
}

impl Fill {
    /// Notional value of the fill in quote currency.
    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }

    /// Age of the fill relative to `now_ms`, in seconds.
    ///
    /// Saturates to zero for fills timestamped in the future.
    pub fn age_secs(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.time_ms) / 1000
    }
}

/// One entry of the authoritative current-position snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivePosition {
    /// Position size (positive magnitude).
    pub size: Decimal,
    /// Position direction.
    pub side: PositionSide,
    /// Position value in quote currency (`size * reference price`).
    pub value: Decimal,
    /// Average entry price.
    pub avg_price: Decimal,
    /// Current mark/reference price.
    pub current_price: Decimal,
}

/// Authoritative snapshot: instrument -> live position.
///
/// An empty map is ambiguous (truly flat, or a wholesale fetch gap) and
/// must never be taken as unconditional truth of "everything closed".
pub type PositionMap = HashMap<String, LivePosition>;

/// The tracker's belief about one open position.
///
/// Exists in the position table iff the tracker currently believes the
/// account holds a non-zero quantity of the instrument. This is also the
/// persisted shape (keyed by instrument in the snapshot file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub size: Decimal,
    pub value: Decimal,
    /// High-water mark of `value` since open. Close alerts derive their
    /// severity tier from this, so a position scaled down over time still
    /// reports at its true tier when finally closed.
    pub max_value: Decimal,
    pub avg_price: Decimal,
    pub current_price: Decimal,
}

impl Position {
    /// Create a position belief from a ground-truth entry (confirmed open).
    pub fn from_live(live: &LivePosition) -> Self {
        Self {
            side: live.side,
            size: live.size,
            value: live.value,
            max_value: live.value,
            avg_price: live.avg_price,
            current_price: live.current_price,
        }
    }
}

/// Outcome of one reconciliation step.
///
/// A closed set: downstream alert dispatch is a total function over these
/// variants, with `None` meaning the table may have been refreshed silently
/// but nothing alert-worthy happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// No externally visible change.
    None,
    /// A new position was confirmed open.
    Open { coin: String, position: Position },
    /// A tracked position was confirmed closed; `position` holds the last
    /// known belief (value, side, prices) at close time.
    Close { coin: String, position: Position },
    /// A tracked position grew by at least the partial-change threshold.
    PartialIncrease {
        coin: String,
        prev_value: Decimal,
        position: Position,
        pct: Decimal,
    },
    /// A tracked position shrank by at least the partial-change threshold.
    PartialClose {
        coin: String,
        prev_value: Decimal,
        position: Position,
        pct: Decimal,
    },
}

impl Transition {
    /// Whether this transition should produce an alert.
    pub fn is_alertable(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_from_signed_size() {
        assert_eq!(
            PositionSide::from_signed_size(dec!(1.5)),
            Some(PositionSide::Long)
        );
        assert_eq!(
            PositionSide::from_signed_size(dec!(-0.2)),
            Some(PositionSide::Short)
        );
        assert_eq!(PositionSide::from_signed_size(dec!(0)), None);
    }

    #[test]
    fn test_fill_side_codes() {
        assert_eq!(FillSide::from_code("B").unwrap(), FillSide::Buy);
        assert_eq!(FillSide::from_code("A").unwrap(), FillSide::Sell);
        assert!(FillSide::from_code("X").is_err());
    }

    #[test]
    fn test_fill_notional_and_age() {
        let fill = Fill {
            coin: "BTC".to_string(),
            side: FillSide::Buy,
            size: dec!(2),
            price: dec!(50000),
            time_ms: 1_000_000,
            fill_id: 1,
        };
        assert_eq!(fill.notional(), dec!(100000));
        assert_eq!(fill.age_secs(1_030_000), 30);
        // Future timestamp saturates to zero age.
        assert_eq!(fill.age_secs(500_000), 0);
    }

    #[test]
    fn test_position_from_live_sets_high_water() {
        let live = LivePosition {
            size: dec!(10),
            side: PositionSide::Short,
            value: dec!(250000),
            avg_price: dec!(25000),
            current_price: dec!(25000),
        };
        let pos = Position::from_live(&live);
        assert_eq!(pos.max_value, dec!(250000));
        assert_eq!(pos.side, PositionSide::Short);
    }

    #[test]
    fn test_position_serde_shape() {
        let pos = Position {
            side: PositionSide::Long,
            size: dec!(100),
            value: dec!(150000),
            max_value: dec!(150000),
            avg_price: dec!(1500),
            current_price: dec!(1500),
        };
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json["side"], "LONG");
        assert!(json.get("max_value").is_some());
        let back: Position = serde_json::from_value(json).unwrap();
        assert_eq!(back, pos);
    }
}
