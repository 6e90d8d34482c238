//! Core domain types for the whale position tracker.
//!
//! This crate provides the fundamental types used throughout the tracker:
//! - `Fill`: one executed trade record from the fill feed
//! - `Position`: the tracker's belief about one open position
//! - `LivePosition`: one entry of the authoritative exchange snapshot
//! - `Transition`: the enumerated outcome of a reconciliation step
//! - `PositionSource` / `AlertSink`: capability traits at the I/O seams

pub mod error;
pub mod source;
pub mod types;

pub use error::{CoreError, Result};
pub use source::{AlertSink, PositionSource, SourceError};
pub use types::{Fill, FillSide, LivePosition, Position, PositionMap, PositionSide, Transition};
