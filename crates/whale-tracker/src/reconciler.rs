//! The position reconciliation state machine.
//!
//! Given the tracker's previous belief about an instrument and the current
//! ground-truth reading, `evaluate` classifies what happened as a
//! `Decision` — a pure, total function over the closed set of cases. The
//! `Reconciler` then commits the decision against the position table,
//! consulting the `CloseVerifier` before any CLOSE, and returns the
//! `Transition` the alert layer dispatches on.
//!
//! Per-instrument lifecycle: `ABSENT -> OPEN -> {increased, reduced}* -> ABSENT`.

use crate::verifier::CloseVerifier;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};
use whale_core::{LivePosition, Position, PositionSource, Transition};

/// Thresholds governing transition evaluation.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Minimum position value for OPEN/CLOSE alerts; applied at alert
    /// emission time, not table membership (except the startup sync).
    pub min_position_value: Decimal,
    /// Minimum relative size change for a PARTIAL_* alert; smaller changes
    /// refresh the table silently.
    pub partial_change_threshold: Decimal,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            min_position_value: Decimal::from(100_000),
            partial_change_threshold: Decimal::new(15, 2),
        }
    }
}

/// Classification of one (previous belief, ground truth) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do (absent on both sides, or an open below the minimum).
    Ignore,
    /// A new position above the minimum value: commit an OPEN.
    Open,
    /// Tracked position missing from ground truth. Must be verified before
    /// a CLOSE is committed.
    CloseCandidate,
    /// Tracked position grew. `alert` is set when the relative change
    /// reaches the partial-change threshold.
    Increase { pct: Decimal, alert: bool },
    /// Tracked position shrank (or is unchanged, with `pct` zero).
    Decrease { pct: Decimal, alert: bool },
}

/// Classify a transition. Pure and total over all four presence cases.
pub fn evaluate(
    prev: Option<&Position>,
    live: Option<&LivePosition>,
    config: &ReconcilerConfig,
) -> Decision {
    match (prev, live) {
        (None, None) => Decision::Ignore,
        (None, Some(live)) => {
            if live.value >= config.min_position_value {
                Decision::Open
            } else {
                Decision::Ignore
            }
        }
        (Some(_), None) => Decision::CloseCandidate,
        (Some(prev), Some(live)) => {
            if prev.size.is_zero() {
                // A zero-size belief should not exist; treat it as absent.
                return if live.value >= config.min_position_value {
                    Decision::Open
                } else {
                    Decision::Ignore
                };
            }
            if live.size > prev.size {
                let pct = (live.size - prev.size) / prev.size;
                Decision::Increase {
                    pct,
                    alert: pct >= config.partial_change_threshold,
                }
            } else {
                let pct = (prev.size - live.size) / prev.size;
                Decision::Decrease {
                    pct,
                    alert: pct >= config.partial_change_threshold,
                }
            }
        }
    }
}

/// The tracker's position table: one entry per instrument believed open.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the book from a persisted snapshot.
    pub fn from_map(positions: HashMap<String, Position>) -> Self {
        Self { positions }
    }

    /// Snapshot view for persistence.
    pub fn as_map(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn get(&self, coin: &str) -> Option<&Position> {
        self.positions.get(coin)
    }

    pub fn get_mut(&mut self, coin: &str) -> Option<&mut Position> {
        self.positions.get_mut(coin)
    }

    /// Insert a belief directly. Used by the startup sync.
    pub fn insert(&mut self, coin: String, position: Position) {
        self.positions.insert(coin, position);
    }

    pub fn contains(&self, coin: &str) -> bool {
        self.positions.contains_key(coin)
    }

    pub fn coins(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of tracked position values.
    pub fn total_value(&self) -> Decimal {
        self.positions.values().map(|p| p.value).sum()
    }
}

/// Owns the position book and commits transitions against it.
pub struct Reconciler {
    book: PositionBook,
    config: ReconcilerConfig,
    verifier: CloseVerifier,
    /// Set by any commit that mutated the book; cleared by `take_dirty`.
    dirty: bool,
}

impl Reconciler {
    pub fn new(book: PositionBook, config: ReconcilerConfig, verifier: CloseVerifier) -> Self {
        Self {
            book,
            config,
            verifier,
            dirty: false,
        }
    }

    /// Whether the book changed since the last check. Clears the flag, so
    /// callers persist exactly the evaluations that touched the table.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PositionBook {
        &mut self.book
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Evaluate and commit one instrument against its ground-truth reading.
    ///
    /// `source` is consulted only when a close candidate needs verification;
    /// that suspension is bounded by the verifier's attempt budget. Returns
    /// the committed transition; `Transition::None` covers silent refreshes
    /// and aborted close candidates alike (the table self-heals on the next
    /// cycle).
    pub async fn reconcile(
        &mut self,
        source: &dyn PositionSource,
        coin: &str,
        live: Option<&LivePosition>,
    ) -> Transition {
        match evaluate(self.book.get(coin), live, &self.config) {
            Decision::Ignore => Transition::None,
            Decision::Open => match live {
                Some(live) => self.commit_open(coin, live),
                None => Transition::None,
            },
            Decision::CloseCandidate => {
                if self.verifier.verify_closed(source, coin).await {
                    self.commit_close(coin)
                } else {
                    debug!(coin, "Close candidate not confirmed, leaving table unchanged");
                    Transition::None
                }
            }
            Decision::Increase { pct, alert } => match live {
                Some(live) => self.commit_increase(coin, live, pct, alert),
                None => Transition::None,
            },
            Decision::Decrease { pct, alert } => match live {
                Some(live) => self.commit_decrease(coin, live, pct, alert),
                None => Transition::None,
            },
        }
    }

    fn commit_open(&mut self, coin: &str, live: &LivePosition) -> Transition {
        let position = Position::from_live(live);
        info!(coin, side = %position.side, value = %position.value, "Position opened");
        self.book.insert(coin.to_string(), position.clone());
        self.dirty = true;
        Transition::Open {
            coin: coin.to_string(),
            position,
        }
    }

    /// Commit a verified close. The entry is removed (and alerted) only if
    /// its last known value met the minimum; a sub-threshold entry stays in
    /// the table untouched and the next cycle re-reads real state.
    fn commit_close(&mut self, coin: &str) -> Transition {
        let meets_minimum = self
            .book
            .get(coin)
            .is_some_and(|p| p.value >= self.config.min_position_value);
        if !meets_minimum {
            return Transition::None;
        }
        match self.book.positions.remove(coin) {
            Some(position) => {
                self.dirty = true;
                info!(coin, side = %position.side, value = %position.value, "Position closed");
                Transition::Close {
                    coin: coin.to_string(),
                    position,
                }
            }
            None => Transition::None,
        }
    }

    fn commit_increase(
        &mut self,
        coin: &str,
        live: &LivePosition,
        pct: Decimal,
        alert: bool,
    ) -> Transition {
        let Some(position) = self.book.get_mut(coin) else {
            return Transition::None;
        };
        let prev_value = position.value;
        position.size = live.size;
        position.value = live.value;
        position.avg_price = live.avg_price;
        position.current_price = live.current_price;
        position.max_value = position.max_value.max(live.value);
        self.dirty = true;

        if !alert {
            debug!(coin, pct = %pct, "Sub-threshold increase, table refreshed silently");
            return Transition::None;
        }
        let position = position.clone();
        info!(coin, pct = %pct, value = %position.value, "Position increased");
        Transition::PartialIncrease {
            coin: coin.to_string(),
            prev_value,
            position,
            pct,
        }
    }

    fn commit_decrease(
        &mut self,
        coin: &str,
        live: &LivePosition,
        pct: Decimal,
        alert: bool,
    ) -> Transition {
        let Some(position) = self.book.get_mut(coin) else {
            return Transition::None;
        };
        let prev_value = position.value;
        position.size = live.size;
        position.value = live.value;
        position.current_price = live.current_price;
        self.dirty = true;

        if !alert {
            debug!(coin, pct = %pct, "Sub-threshold decrease, table refreshed silently");
            return Transition::None;
        }
        let position = position.clone();
        info!(coin, pct = %pct, value = %position.value, "Position reduced");
        Transition::PartialClose {
            coin: coin.to_string(),
            prev_value,
            position,
            pct,
        }
    }
}
