//! Hyperliquid info-endpoint REST client.
//!
//! The tracker's only data source: a polled `/info` endpoint serving fill
//! history (`userFills`), the authoritative position snapshot
//! (`clearinghouseState`), and mid prices (`allMids`). All responses are
//! decoded through raw serde structs before conversion to core types.

pub mod client;
pub mod error;
pub mod response;

pub use client::InfoClient;
pub use error::{ExchangeError, ExchangeResult};
