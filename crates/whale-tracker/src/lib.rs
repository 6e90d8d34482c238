//! Position reconciliation for the whale tracker.
//!
//! Turns a noisy, partial, possibly out-of-order fill feed into coherent
//! position lifecycle transitions:
//!
//! ```text
//! raw fills -> FillDeduplicator -> FillAggregator (debounce per coin+side)
//!                                        |
//!                                 flushed batch
//!                                        v
//!                         Reconciler <- ground truth snapshot
//!                         (CloseVerifier before any CLOSE)
//!                                        v
//!                                   Transition
//! ```
//!
//! The reconciler is the single mutation point for the position table; the
//! monitor loop in `whale-bot` drives it from one event loop so batch
//! flushes and periodic sweeps never interleave.

pub mod aggregator;
pub mod dedup;
pub mod reconciler;
pub mod verifier;

pub use aggregator::{BatchKey, FillAggregator, FillBatch};
pub use dedup::FillDeduplicator;
pub use reconciler::{evaluate, Decision, PositionBook, Reconciler, ReconcilerConfig};
pub use verifier::CloseVerifier;
