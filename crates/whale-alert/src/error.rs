//! Alert error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

pub type AlertResult<T> = Result<T, AlertError>;
