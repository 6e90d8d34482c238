//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] whale_exchange::ExchangeError),

    #[error("Alert error: {0}")]
    Alert(#[from] whale_alert::AlertError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] whale_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] whale_persistence::PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
