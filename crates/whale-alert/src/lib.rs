//! Alert classification and delivery for the whale tracker.
//!
//! Maps a committed `Transition` to a severity tier and a human-readable
//! rendering (Telegram HTML), then hands it to the messaging sink. The
//! tier mapping is cosmetic presentation, not a correctness boundary.

pub mod error;
pub mod render;
pub mod telegram;
pub mod tier;

pub use error::{AlertError, AlertResult};
pub use render::{format_price, format_value, render_transition, AlertContext};
pub use telegram::TelegramNotifier;
pub use tier::{tier_for, Tier};
