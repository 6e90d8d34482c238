//! Capability traits at the I/O seams.
//!
//! The close verifier and the reconciliation sweep only need "give me the
//! authoritative snapshot" and "deliver this message"; expressing those as
//! traits keeps the retry/verification logic testable with in-memory stubs.

use crate::types::PositionMap;
use async_trait::async_trait;
use thiserror::Error;

/// Failure kinds for a ground-truth fetch.
///
/// Distinct from "snapshot is empty": an `Ok` empty map means the fetch
/// nominally succeeded but is still ambiguous evidence (the close verifier
/// decides what it means); an `Err` means no snapshot was obtained at all.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Authoritative current-position snapshot provider.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Fetch the account's current positions, keyed by instrument.
    async fn current_positions(&self) -> Result<PositionMap, SourceError>;
}

/// Fire-and-forget notification sink.
///
/// Delivery failures are the implementation's concern to log; callers never
/// retry and never treat a failure as fatal.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver a rendered message, best effort.
    async fn send(&self, message: &str);
}
