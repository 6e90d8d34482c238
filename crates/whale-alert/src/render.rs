//! Telegram HTML rendering of transitions.
//!
//! Alert bodies carry the whale's display name as a Coinglass deep link
//! (HTML-escaped, previews disabled at the delivery layer), the shortened
//! account address, and a BTC reference price line.

use crate::tier::{tier_for, Tier};
use rust_decimal::Decimal;
use whale_core::{Position, Transition};

/// Identity and market context shared by all alert renderings.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub whale_name: String,
    pub whale_address: String,
    /// Last known BTC reference price; zero when never fetched.
    pub btc_price: Decimal,
}

impl AlertContext {
    pub fn coinglass_url(&self) -> String {
        format!("https://www.coinglass.com/hyperliquid/{}", self.whale_address)
    }

    /// Shortened address for display ("0x1234ab...").
    pub fn short_address(&self) -> String {
        let head: String = self.whale_address.chars().take(6).collect();
        format!("{head}...")
    }

    fn name_link(&self) -> String {
        format!(
            "<a href='{}'>{}</a>",
            self.coinglass_url(),
            escape_html(&self.whale_name)
        )
    }

    fn btc_line(&self) -> String {
        format!("\u{20BF} BTC: ${:.0}", self.btc_price)
    }
}

/// Escape the HTML-special characters Telegram's HTML parse mode cares about.
pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Compact value formatting: $1.5M / $150K / $500.
pub fn format_value(value: Decimal) -> String {
    let million = Decimal::from(1_000_000);
    let thousand = Decimal::from(1_000);
    if value >= million {
        format!("${:.1}M", value / million)
    } else if value >= thousand {
        format!("${:.0}K", value / thousand)
    } else {
        format!("${value:.0}")
    }
}

/// Price formatting with magnitude-dependent precision.
pub fn format_price(price: Decimal) -> String {
    if price.is_zero() {
        "N/A".to_string()
    } else if price >= Decimal::from(1000) {
        format!("${price:.0}")
    } else if price >= Decimal::ONE {
        format!("${price:.2}")
    } else if price >= Decimal::new(1, 2) {
        format!("${price:.4}")
    } else {
        format!("${price:.8}")
    }
}

fn tier_or_blank(coin: &str, value: Decimal) -> Tier {
    tier_for(coin, value).unwrap_or(Tier {
        emoji: "",
        label: "",
    })
}

fn entry_price_line(position: &Position) -> String {
    if position.avg_price > Decimal::ZERO {
        format!("\n\u{1F4E5} Entry Price: {}", format_price(position.avg_price))
    } else {
        String::new()
    }
}

/// Render a transition to its alert body.
///
/// Total over the transition set: `None` for `Transition::None`, a message
/// for everything else.
pub fn render_transition(ctx: &AlertContext, transition: &Transition) -> Option<String> {
    match transition {
        Transition::None => None,
        Transition::Open { coin, position } => {
            Some(render_open(ctx, coin, position))
        }
        Transition::Close { coin, position } => Some(render_close(ctx, coin, position)),
        Transition::PartialIncrease {
            coin,
            prev_value,
            position,
            pct,
        } => Some(render_partial(ctx, coin, position, *prev_value, *pct, true)),
        Transition::PartialClose {
            coin,
            prev_value,
            position,
            pct,
        } => Some(render_partial(ctx, coin, position, *prev_value, *pct, false)),
    }
}

fn render_open(ctx: &AlertContext, coin: &str, position: &Position) -> String {
    let tier = tier_or_blank(coin, position.value);
    format!(
        "{emoji} OPEN POSITION <b>{coin} {side}</b>: {label} {emoji}\n\
         \u{1F4C8} Action: <b>OPEN {coin} {side}</b>\n\
         \u{1F40B} Whale: {addr}\n\
         \u{1F4DD} {name}\n\
         \u{1F4B5} Value: {value}\n\
         \u{1F4B0} Price: {price}\n\
         {btc}",
        emoji = tier.emoji,
        label = tier.label,
        side = position.side,
        addr = ctx.short_address(),
        name = ctx.name_link(),
        value = format_value(position.value),
        price = format_price(position.current_price),
        btc = ctx.btc_line(),
    )
}

fn render_close(ctx: &AlertContext, coin: &str, position: &Position) -> String {
    // Tier from the high-water mark, not the (possibly reduced) final value.
    let tier = tier_or_blank(coin, position.max_value);
    format!(
        "{emoji} CLOSE POSITION <b>{coin} {side}</b>: {label} {emoji}\n\
         \u{1F4C9} Action: <b>CLOSE {coin} {side}</b>\n\
         \u{1F40B} Whale: {addr}\n\
         \u{1F4DD} {name}\n\
         \u{1F4B5} Closed: {value}{entry}\n\
         \u{1F4B0} Exit Price: {price}\n\
         {btc}",
        emoji = tier.emoji,
        label = tier.label,
        side = position.side,
        addr = ctx.short_address(),
        name = ctx.name_link(),
        value = format_value(position.value),
        entry = entry_price_line(position),
        price = format_price(position.current_price),
        btc = ctx.btc_line(),
    )
}

fn render_partial(
    ctx: &AlertContext,
    coin: &str,
    position: &Position,
    prev_value: Decimal,
    pct: Decimal,
    increase: bool,
) -> String {
    let tier = tier_or_blank(coin, position.max_value);
    let pct_display = pct * Decimal::from(100);
    let (headline, action, change_label, arrow) = if increase {
        ("PARTIAL INCREASE", "Adding to Position", "Increased", "\u{1F4C8}")
    } else {
        ("PARTIAL CLOSE", "Scaling Out", "Reduced", "\u{1F4C9}")
    };
    format!(
        "{emoji} {headline} {pct_display:.1}% (<b>{coin} {side}</b> {label}) {emoji}\n\
         {arrow} {action}: <b>{coin} {side}</b>\n\
         \u{1F40B} Whale: {addr}\n\
         \u{1F4DD} {name}\n\
         \u{1F4CA} Previous: {prev}\n\
         \u{1F4CA} Current: {curr}\n\
         {arrow} {change_label}: {pct_display:.1}%{entry}\n\
         \u{1F4B0} Current Price: {price}\n\
         {btc}",
        emoji = tier.emoji,
        label = tier.label,
        side = position.side,
        addr = ctx.short_address(),
        name = ctx.name_link(),
        prev = format_value(prev_value),
        curr = format_value(position.value),
        entry = entry_price_line(position),
        price = format_price(position.current_price),
        btc = ctx.btc_line(),
    )
}

/// Startup banner sent once the tracker is running.
pub fn render_startup(ctx: &AlertContext, min_position_value: Decimal, partial_pct: Decimal) -> String {
    format!(
        "\u{1F680} <b>Whale Position Tracker Started</b>\n\
         \u{1F4CA} Real-time position alerts enabled\n\
         \u{1F3AF} Tracking opens, closes, and partial changes ({:.0}%+)\n\
         \u{1F4B0} Minimum position: {}\n\
         \u{1F527} Close verification enabled (double-check closes)\n\n\
         \u{1F40B} <b>Tracking:</b> {}",
        partial_pct * Decimal::from(100),
        format_value(min_position_value),
        ctx.name_link(),
    )
}

/// Shutdown summary with the open-position tally.
pub fn render_shutdown(ctx: &AlertContext, open_positions: usize, total_value: Decimal) -> String {
    format!(
        "\u{1F6D1} <b>Whale Tracker Stopped</b>\n\
         \u{1F4CA} Open positions: {open_positions}\n\
         \u{1F4B0} Total value: {}\n\
         \u{1F40B} {}",
        format_value(total_value),
        ctx.name_link(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use whale_core::PositionSide;

    fn ctx() -> AlertContext {
        AlertContext {
            whale_name: "Big <Whale> & Co".to_string(),
            whale_address: "0xabc123def456".to_string(),
            btc_price: dec!(100000),
        }
    }

    fn position(value: Decimal, max_value: Decimal) -> Position {
        Position {
            side: PositionSide::Long,
            size: dec!(10),
            value,
            max_value,
            avg_price: dec!(1500),
            current_price: dec!(1600),
        }
    }

    #[test]
    fn test_format_value_magnitudes() {
        assert_eq!(format_value(dec!(2500000)), "$2.5M");
        assert_eq!(format_value(dec!(150000)), "$150K");
        assert_eq!(format_value(dec!(500)), "$500");
    }

    #[test]
    fn test_format_price_precision() {
        assert_eq!(format_price(dec!(0)), "N/A");
        assert_eq!(format_price(dec!(65000)), "$65000");
        assert_eq!(format_price(dec!(3.14159)), "$3.14");
        assert_eq!(format_price(dec!(0.5)), "$0.5000");
        assert_eq!(format_price(dec!(0.00012345)), "$0.00012345");
    }

    #[test]
    fn test_whale_name_is_escaped() {
        let msg = render_transition(
            &ctx(),
            &Transition::Open {
                coin: "ETH".to_string(),
                position: position(dec!(150000), dec!(150000)),
            },
        )
        .unwrap();
        assert!(msg.contains("Big &lt;Whale&gt; &amp; Co"));
        assert!(msg.contains("coinglass.com/hyperliquid/0xabc123def456"));
        assert!(msg.contains("0xabc1..."));
    }

    #[test]
    fn test_close_tier_uses_high_water_mark() {
        // Closed at $180K after peaking at $2M: tier must read 1M+.
        let msg = render_transition(
            &ctx(),
            &Transition::Close {
                coin: "BTC".to_string(),
                position: position(dec!(180000), dec!(2000000)),
            },
        )
        .unwrap();
        assert!(msg.contains("1M+"));
        assert!(msg.contains("Closed: $180K"));
    }

    #[test]
    fn test_partial_close_shows_both_values_and_pct() {
        let msg = render_transition(
            &ctx(),
            &Transition::PartialClose {
                coin: "SOL".to_string(),
                prev_value: dec!(400000),
                position: position(dec!(200000), dec!(400000)),
                pct: dec!(0.5),
            },
        )
        .unwrap();
        assert!(msg.contains("PARTIAL CLOSE 50.0%"));
        assert!(msg.contains("Previous: $400K"));
        assert!(msg.contains("Current: $200K"));
    }

    #[test]
    fn test_none_renders_nothing() {
        assert!(render_transition(&ctx(), &Transition::None).is_none());
    }
}
