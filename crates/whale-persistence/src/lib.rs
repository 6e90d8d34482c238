//! Durable position snapshot.
//!
//! The position table is persisted as one JSON document (instrument ->
//! position) after every committed transition and on shutdown, and reloaded
//! at startup as the initial belief state — a soft truth superseded by the
//! first ground-truth sync.

pub mod error;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use store::PositionStore;
