//! Severity tiers for alert presentation.
//!
//! Two instrument classes: the majors (BTC, ETH) get four tiers, everything
//! else a single $100K+ tier. OPEN/INCREASE alerts tier on current value;
//! CLOSE/PARTIAL_CLOSE tier on the position's high-water `max_value` so a
//! position scaled down over time still reports at its true size class.

use rust_decimal::Decimal;

/// One severity tier: emoji decoration plus a value-class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub emoji: &'static str,
    pub label: &'static str,
}

const MAJORS: [&str; 2] = ["BTC", "ETH"];

const M: i64 = 1_000_000;

/// Look up the tier for an instrument at a given value.
///
/// Returns `None` below $100K (no decoration, and in practice no alert
/// since the tracker's minimum position value defaults to $100K).
pub fn tier_for(coin: &str, value: Decimal) -> Option<Tier> {
    if MAJORS.contains(&coin) {
        if value >= Decimal::from(50 * M) {
            return Some(Tier {
                emoji: "\u{1F680}\u{1F680}\u{1F680}\u{1F680}",
                label: "50M+",
            });
        }
        if value >= Decimal::from(10 * M) {
            return Some(Tier {
                emoji: "\u{1F6A8}\u{1F6A8}\u{1F6A8}",
                label: "10M+",
            });
        }
        if value >= Decimal::from(M) {
            return Some(Tier {
                emoji: "\u{1F47D}\u{1F47D}",
                label: "1M+",
            });
        }
        if value >= Decimal::from(100_000) {
            return Some(Tier {
                emoji: "\u{1F7E1}",
                label: "100K+",
            });
        }
    } else if value >= Decimal::from(100_000) {
        return Some(Tier {
            emoji: "\u{1F921}\u{1F921}",
            label: "100K+",
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_major_tiers() {
        assert_eq!(tier_for("BTC", dec!(60000000)).unwrap().label, "50M+");
        assert_eq!(tier_for("BTC", dec!(10000000)).unwrap().label, "10M+");
        assert_eq!(tier_for("ETH", dec!(2000000)).unwrap().label, "1M+");
        assert_eq!(tier_for("ETH", dec!(150000)).unwrap().label, "100K+");
        assert!(tier_for("BTC", dec!(99999)).is_none());
    }

    #[test]
    fn test_other_instruments_have_single_tier() {
        let tier = tier_for("SOL", dec!(75000000)).unwrap();
        assert_eq!(tier.label, "100K+");
        assert!(tier_for("SOL", dec!(50000)).is_none());
    }
}
