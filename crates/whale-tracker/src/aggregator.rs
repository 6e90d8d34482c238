//! Debounced fill aggregation.
//!
//! A whale order usually executes as a burst of partial fills. Aggregation
//! batches same-direction fills per instrument behind a debounce window so
//! the burst produces one reconciliation evaluation, not one per fragment.
//!
//! Each `(coin, side)` key owns at most one pending timer. Arming a new
//! timer aborts the previous one, so a steady drip of fills keeps deferring
//! evaluation until the drip pauses. A fired timer only sends its key back
//! to the monitor loop over the flush channel; the loop then calls
//! `take_batch`, which clears the key's transient state unconditionally.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use whale_core::{Fill, FillSide};

/// Aggregation key: one pending batch per instrument and direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub coin: String,
    pub side: FillSide,
}

impl BatchKey {
    pub fn for_fill(fill: &Fill) -> Self {
        Self {
            coin: fill.coin.clone(),
            side: fill.side,
        }
    }
}

impl std::fmt::Display for BatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.coin, self.side)
    }
}

/// A flushed batch of same-direction fills for one instrument.
#[derive(Debug, Clone)]
pub struct FillBatch {
    pub key: BatchKey,
    pub fills: Vec<Fill>,
}

impl FillBatch {
    /// Sum of fill sizes.
    pub fn total_size(&self) -> Decimal {
        self.fills.iter().map(|f| f.size).sum()
    }

    /// Total notional value (sum of size * price).
    pub fn notional(&self) -> Decimal {
        self.fills.iter().map(|f| f.notional()).sum()
    }

    /// Size-weighted average price across the batch.
    pub fn vwap(&self) -> Decimal {
        let total = self.total_size();
        if total.is_zero() {
            return Decimal::ZERO;
        }
        self.notional() / total
    }

    pub fn fill_count(&self) -> usize {
        self.fills.len()
    }
}

/// Coalesces fills into per-key batches behind cancellable debounce timers.
pub struct FillAggregator {
    window: Duration,
    /// Fills below this notional are dust and never enter a batch.
    min_notional: Decimal,
    pending: HashMap<BatchKey, Vec<Fill>>,
    timers: HashMap<BatchKey, JoinHandle<()>>,
    flush_tx: mpsc::Sender<BatchKey>,
}

impl FillAggregator {
    pub fn new(window: Duration, min_notional: Decimal, flush_tx: mpsc::Sender<BatchKey>) -> Self {
        Self {
            window,
            min_notional,
            pending: HashMap::new(),
            timers: HashMap::new(),
            flush_tx,
        }
    }

    /// Queue a fill for aggregation and (re)arm the key's debounce timer.
    ///
    /// Returns `false` if the fill was dropped as dust.
    pub fn enqueue(&mut self, fill: Fill) -> bool {
        if fill.notional() < self.min_notional {
            return false;
        }

        let key = BatchKey::for_fill(&fill);
        self.pending.entry(key.clone()).or_default().push(fill);

        let tx = self.flush_tx.clone();
        let window = self.window;
        let timer_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // Loop gone on shutdown; nothing left to flush to.
            let _ = tx.send(timer_key).await;
        });

        // Cancel-and-replace: at most one pending evaluation per key.
        if let Some(prev) = self.timers.insert(key.clone(), handle) {
            prev.abort();
        }

        debug!(key = %key, pending = self.pending[&key].len(), "Fill queued for aggregation");
        true
    }

    /// Remove and return the batch for a fired key.
    ///
    /// Clears both the batch and the timer entry regardless of what the
    /// caller does with the result, so transient state never outlives one
    /// evaluation.
    pub fn take_batch(&mut self, key: &BatchKey) -> Option<FillBatch> {
        if let Some(handle) = self.timers.remove(key) {
            handle.abort();
        }
        let fills = self.pending.remove(key)?;
        if fills.is_empty() {
            return None;
        }
        Some(FillBatch {
            key: key.clone(),
            fills,
        })
    }

    /// Per-key (fill count, total notional) of batches still pending.
    pub fn pending_summary(&self) -> Vec<(BatchKey, usize, Decimal)> {
        self.pending
            .iter()
            .map(|(key, fills)| {
                let notional: Decimal = fills.iter().map(|f| f.notional()).sum();
                (key.clone(), fills.len(), notional)
            })
            .collect()
    }

    /// Abort all armed timers. Used on shutdown.
    pub fn abort_timers(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

impl Drop for FillAggregator {
    fn drop(&mut self) {
        self.abort_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::time::advance;

    const WINDOW: Duration = Duration::from_secs(30);

    fn fill(coin: &str, side: FillSide, size: Decimal, price: Decimal, id: u64) -> Fill {
        Fill {
            coin: coin.to_string(),
            side,
            size,
            price,
            time_ms: 0,
            fill_id: id,
        }
    }

    fn aggregator(tx: mpsc::Sender<BatchKey>) -> FillAggregator {
        FillAggregator::new(WINDOW, dec!(10000), tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_batch() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut agg = aggregator(tx);

        assert!(agg.enqueue(fill("BTC", FillSide::Buy, dec!(1), dec!(60000), 1)));
        tokio::task::yield_now().await;
        advance(Duration::from_secs(5)).await;
        assert!(agg.enqueue(fill("BTC", FillSide::Buy, dec!(3), dec!(62000), 2)));
        tokio::task::yield_now().await;

        // First timer was replaced; the rearmed one fires 30s after fill 2.
        advance(Duration::from_secs(25)).await;
        assert!(rx.try_recv().is_err());

        advance(Duration::from_secs(5)).await;
        let key = rx.recv().await.unwrap();
        assert_eq!(key.coin, "BTC");

        let batch = agg.take_batch(&key).unwrap();
        assert_eq!(batch.fill_count(), 2);
        assert_eq!(batch.total_size(), dec!(4));
        // VWAP: (1*60000 + 3*62000) / 4 = 61500
        assert_eq!(batch.vwap(), dec!(61500));

        // Exactly one flush for the whole burst.
        assert!(rx.try_recv().is_err());
        // Transient state is gone.
        assert!(agg.take_batch(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dust_fills_are_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut agg = aggregator(tx);

        // 0.1 * 50000 = 5000 < 10000 floor.
        assert!(!agg.enqueue(fill("ETH", FillSide::Sell, dec!(0.1), dec!(50000), 1)));
        advance(WINDOW + Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert!(agg.pending_summary().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_debounce_independently() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut agg = aggregator(tx);

        agg.enqueue(fill("BTC", FillSide::Buy, dec!(1), dec!(60000), 1));
        agg.enqueue(fill("BTC", FillSide::Sell, dec!(1), dec!(60000), 2));
        tokio::task::yield_now().await;

        advance(WINDOW).await;
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_ne!(first, second);
        assert!(agg.take_batch(&first).is_some());
        assert!(agg.take_batch(&second).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_batch_cancels_armed_timer() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut agg = aggregator(tx);

        agg.enqueue(fill("SOL", FillSide::Buy, dec!(100), dec!(150), 1));
        tokio::task::yield_now().await;

        let key = BatchKey {
            coin: "SOL".to_string(),
            side: FillSide::Buy,
        };
        assert!(agg.take_batch(&key).is_some());

        // The aborted timer never delivers a flush.
        advance(WINDOW + Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
