//! Application configuration.
//!
//! Layered: an optional TOML file under environment variables, so the
//! deployment environment (`WHALE_ADDRESS`, `TELEGRAM_TOKEN`, ...) can run
//! the tracker with no file at all. Every tunable has a default; only the
//! account address and the Telegram credentials are mandatory, and missing
//! ones fail fast before the monitor loop starts.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default info endpoint.
const DEFAULT_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracked account address. Mandatory.
    #[serde(default)]
    pub whale_address: String,
    /// Display name used in alert renderings.
    #[serde(default = "default_whale_name")]
    pub whale_name: String,
    /// Telegram bot token. Mandatory.
    #[serde(default)]
    pub telegram_token: String,
    /// Telegram chat id. Mandatory.
    #[serde(default)]
    pub telegram_chat_id: String,

    /// Info endpoint URL.
    #[serde(default = "default_info_url")]
    pub info_url: String,

    /// Fill poll interval (seconds). Default: 2.0.
    #[serde(default = "default_check_interval_secs", alias = "check_interval")]
    pub check_interval_secs: f64,
    /// Maximum fill age before it is discarded as stale (seconds). Default: 300.
    #[serde(default = "default_max_trade_age_secs", alias = "max_trade_age")]
    pub max_trade_age_secs: u64,
    /// Debounce window for fill aggregation (seconds). Default: 30.
    #[serde(
        default = "default_fill_aggregation_window_secs",
        alias = "fill_aggregation_window"
    )]
    pub fill_aggregation_window_secs: u64,
    /// Full reconciliation sweep period (seconds). Default: 30.
    #[serde(default = "default_full_sweep_interval_secs")]
    pub full_sweep_interval_secs: u64,

    /// Minimum position value for OPEN/CLOSE alerts (USD). Default: 100000.
    #[serde(default = "default_min_position_value")]
    pub min_position_value: Decimal,
    /// Minimum relative size change for a PARTIAL_* alert. Default: 0.15.
    #[serde(default = "default_partial_change_threshold")]
    pub partial_change_threshold: Decimal,
    /// Minimum fill notional to enter aggregation (USD). Default: 10000.
    #[serde(default = "default_min_fill_notional")]
    pub min_fill_notional: Decimal,

    /// Snapshot checks before a close is confirmed. Default: 3.
    #[serde(default = "default_close_verify_attempts")]
    pub close_verify_attempts: u32,
    /// Delay between close verification attempts (seconds). Default: 5.
    #[serde(default = "default_close_verify_delay_secs")]
    pub close_verify_delay_secs: u64,

    /// Poll backoff ceiling after repeated failures (seconds). Default: 60.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Path of the persisted position snapshot.
    #[serde(default = "default_positions_file")]
    pub positions_file: String,
}

fn default_whale_name() -> String {
    "Whale Trader".to_string()
}

fn default_info_url() -> String {
    DEFAULT_INFO_URL.to_string()
}

fn default_check_interval_secs() -> f64 {
    2.0
}

fn default_max_trade_age_secs() -> u64 {
    300
}

fn default_fill_aggregation_window_secs() -> u64 {
    30
}

fn default_full_sweep_interval_secs() -> u64 {
    30
}

fn default_min_position_value() -> Decimal {
    Decimal::from(100_000)
}

fn default_partial_change_threshold() -> Decimal {
    Decimal::new(15, 2)
}

fn default_min_fill_notional() -> Decimal {
    Decimal::from(10_000)
}

fn default_close_verify_attempts() -> u32 {
    3
}

fn default_close_verify_delay_secs() -> u64 {
    5
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_positions_file() -> String {
    "whale_positions.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            whale_address: String::new(),
            whale_name: default_whale_name(),
            telegram_token: String::new(),
            telegram_chat_id: String::new(),
            info_url: default_info_url(),
            check_interval_secs: default_check_interval_secs(),
            max_trade_age_secs: default_max_trade_age_secs(),
            fill_aggregation_window_secs: default_fill_aggregation_window_secs(),
            full_sweep_interval_secs: default_full_sweep_interval_secs(),
            min_position_value: default_min_position_value(),
            partial_change_threshold: default_partial_change_threshold(),
            min_fill_notional: default_min_fill_notional(),
            close_verify_attempts: default_close_verify_attempts(),
            close_verify_delay_secs: default_close_verify_delay_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            positions_file: default_positions_file(),
        }
    }
}

impl AppConfig {
    /// Load configuration: optional TOML file layered under environment
    /// variables (`WHALE_ADDRESS`, `TELEGRAM_TOKEN`, `MIN_POSITION_VALUE`, ...).
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to load config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Fail fast on missing mandatory settings.
    pub fn validate(&self) -> AppResult<()> {
        if self.whale_address.is_empty() {
            return Err(AppError::Config("WHALE_ADDRESS is not set".to_string()));
        }
        if self.telegram_token.is_empty() {
            return Err(AppError::Config("TELEGRAM_TOKEN is not set".to_string()));
        }
        if self.telegram_chat_id.is_empty() {
            return Err(AppError::Config("TELEGRAM_CHAT_ID is not set".to_string()));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval_secs.max(0.1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.full_sweep_interval_secs.max(1))
    }

    pub fn aggregation_window(&self) -> Duration {
        Duration::from_secs(self.fill_aggregation_window_secs)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_secs(self.close_verify_delay_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            whale_address = "0xabc"
            telegram_token = "tok"
            telegram_chat_id = "42"
            "#,
        )
        .unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.check_interval_secs, 2.0);
        assert_eq!(cfg.max_trade_age_secs, 300);
        assert_eq!(cfg.fill_aggregation_window_secs, 30);
        assert_eq!(cfg.min_position_value, dec!(100000));
        assert_eq!(cfg.partial_change_threshold, dec!(0.15));
        assert_eq!(cfg.close_verify_attempts, 3);
        assert_eq!(cfg.min_fill_notional, dec!(10000));
        assert_eq!(cfg.whale_name, "Whale Trader");
    }

    #[test]
    fn test_legacy_aliases_accepted() {
        let cfg: AppConfig = toml::from_str(
            r#"
            whale_address = "0xabc"
            check_interval = 5.0
            max_trade_age = 120
            fill_aggregation_window = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.check_interval_secs, 5.0);
        assert_eq!(cfg.max_trade_age_secs, 120);
        assert_eq!(cfg.fill_aggregation_window_secs, 10);
    }

    #[test]
    fn test_missing_mandatory_settings_fail_validation() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_err());

        let cfg: AppConfig = toml::from_str(r#"whale_address = "0xabc""#).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_TOKEN"));
    }
}
