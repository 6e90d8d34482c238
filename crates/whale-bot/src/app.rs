//! Main application orchestration.
//!
//! One event loop per tracked account drives everything: fill polling,
//! debounce flush handling, the periodic full-reconciliation sweep, and
//! shutdown. Debounce timers run as detached tasks but only send their key
//! back over the flush channel, so the loop stays the sole reader/writer
//! of the position table and the pending-batch table — batch evaluations
//! and sweeps can never interleave destructively.

use crate::config::AppConfig;
use crate::error::AppResult;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use whale_alert::{render, AlertContext, TelegramNotifier};
use whale_core::{AlertSink, Position, Transition};
use whale_exchange::InfoClient;
use whale_persistence::PositionStore;
use whale_tracker::{
    BatchKey, CloseVerifier, FillAggregator, FillDeduplicator, PositionBook, Reconciler,
    ReconcilerConfig,
};

/// Log a position-table summary every this many poll cycles.
const POSITION_LOG_CYCLES: u64 = 10;

/// Log the pending-batch summary every this many poll cycles.
const PENDING_LOG_CYCLES: u64 = 50;

/// Exponent cap for poll backoff (2^5 = 32x base interval before the ceiling).
const MAX_BACKOFF_EXP: u32 = 5;

/// Main application.
pub struct Application {
    config: AppConfig,
    client: InfoClient,
    notifier: TelegramNotifier,
    store: PositionStore,
    dedup: FillDeduplicator,
    reconciler: Reconciler,
    alert_ctx: AlertContext,
}

impl Application {
    /// Create the application and reload the persisted belief state.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = InfoClient::new(&config.info_url, &config.whale_address)?;
        let notifier = TelegramNotifier::new(&config.telegram_token, &config.telegram_chat_id)?;
        let store = PositionStore::new(&config.positions_file);

        let book = PositionBook::from_map(store.load());
        let reconciler = Reconciler::new(
            book,
            ReconcilerConfig {
                min_position_value: config.min_position_value,
                partial_change_threshold: config.partial_change_threshold,
            },
            CloseVerifier::new(config.close_verify_attempts, config.verify_delay()),
        );

        let dedup = FillDeduplicator::new(config.max_trade_age_secs);
        let alert_ctx = AlertContext {
            whale_name: config.whale_name.clone(),
            whale_address: config.whale_address.clone(),
            btc_price: rust_decimal::Decimal::ZERO,
        };

        Ok(Self {
            config,
            client,
            notifier,
            store,
            dedup,
            reconciler,
            alert_ctx,
        })
    }

    /// Run the monitor loop until shutdown.
    pub async fn run(mut self) -> AppResult<()> {
        info!(
            whale = %self.alert_ctx.short_address(),
            min_position = %self.config.min_position_value,
            partial_threshold = %self.config.partial_change_threshold,
            poll_secs = self.config.check_interval_secs,
            window_secs = self.config.fill_aggregation_window_secs,
            "Starting whale monitoring"
        );

        match self.client.probe().await {
            Ok(()) => {
                info!("Exchange API reachable");
                self.sync_startup().await;
            }
            Err(e) => {
                // Often a maintenance window; keep observing and let the
                // loop's backoff handle it.
                warn!(%e, "Exchange API not responding at startup");
            }
        }

        self.refresh_btc_price().await;
        let banner = render::render_startup(
            &self.alert_ctx,
            self.config.min_position_value,
            self.config.partial_change_threshold,
        );
        self.notifier.send(&banner).await;

        let (flush_tx, mut flush_rx) = mpsc::channel::<BatchKey>(64);
        let mut aggregator = FillAggregator::new(
            self.config.aggregation_window(),
            self.config.min_fill_notional,
            flush_tx,
        );

        let mut sweep_interval = tokio::time::interval(self.config.sweep_interval());
        sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; the startup sync just ran.
        sweep_interval.tick().await;

        let mut error_streak: u32 = 0;
        let mut cycle: u64 = 0;

        loop {
            let poll_delay = self.poll_delay(error_streak);
            tokio::select! {
                _ = tokio::time::sleep(poll_delay) => {
                    cycle += 1;
                    match self.poll_fills(&mut aggregator).await {
                        Ok(0) => {
                            if error_streak == 0 {
                                warn!("Fill feed returned nothing, backing off");
                            }
                            error_streak += 1;
                        }
                        Ok(_) => {
                            if error_streak > 0 {
                                info!("Exchange API connection restored");
                            }
                            error_streak = 0;
                        }
                        Err(e) => {
                            if error_streak == 0 {
                                warn!(%e, "Fill poll failed, backing off");
                            } else {
                                debug!(%e, streak = error_streak, "Fill poll still failing");
                            }
                            error_streak += 1;
                        }
                    }
                    self.log_status(cycle, &aggregator);
                }
                Some(key) = flush_rx.recv() => {
                    if let Err(e) = self.handle_flush(&mut aggregator, &key).await {
                        error!(%e, key = %key, "Batch evaluation failed");
                    }
                }
                _ = sweep_interval.tick() => {
                    if let Err(e) = self.run_sweep().await {
                        error!(%e, "Reconciliation sweep failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.shutdown(&mut aggregator).await;
        Ok(())
    }

    /// Poll the fill feed, dedup, and queue fresh fills for aggregation.
    ///
    /// Returns the raw fill count; zero is ambiguous (quiet account or a
    /// transient outage) and the caller backs off either way.
    async fn poll_fills(&mut self, aggregator: &mut FillAggregator) -> AppResult<usize> {
        let fills = self.client.fetch_recent_fills().await?;
        let raw_count = fills.len();
        if raw_count == 0 {
            return Ok(0);
        }

        let now_ms = Utc::now().timestamp_millis() as u64;
        let mut fresh = 0;
        let mut queued = 0;
        for fill in fills {
            // Record the id even for stale fills so they never pass later.
            if !self.dedup.observe(fill.fill_id) {
                continue;
            }
            fresh += 1;
            if self.dedup.is_stale(&fill, now_ms) {
                continue;
            }
            if aggregator.enqueue(fill) {
                queued += 1;
            }
        }

        if fresh > 0 {
            debug!(fresh, queued, "Processed fill poll");
        }
        Ok(raw_count)
    }

    /// Evaluate one flushed batch against ground truth.
    async fn handle_flush(
        &mut self,
        aggregator: &mut FillAggregator,
        key: &BatchKey,
    ) -> AppResult<()> {
        let Some(batch) = aggregator.take_batch(key) else {
            return Ok(());
        };
        info!(
            key = %key,
            fills = batch.fill_count(),
            total_size = %batch.total_size(),
            vwap = %batch.vwap(),
            "Evaluating aggregated fills"
        );

        let snapshot = match self.client.fetch_positions().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // No snapshot, no verdict. The batch state is already
                // cleared; the sweep picks up whatever really happened.
                warn!(%e, key = %key, "Snapshot fetch failed, skipping batch evaluation");
                return Ok(());
            }
        };

        let live = snapshot.get(&key.coin).cloned();
        let transition = self
            .reconciler
            .reconcile(&self.client, &key.coin, live.as_ref())
            .await;
        self.emit(transition).await;
        Ok(())
    }

    /// Full sweep: compare every tracked instrument against ground truth,
    /// independent of fills. Catches closes and changes the fill feed
    /// never showed.
    async fn run_sweep(&mut self) -> AppResult<()> {
        if self.reconciler.book().is_empty() {
            return Ok(());
        }

        let snapshot = match self.client.fetch_positions().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%e, "Snapshot fetch failed, skipping sweep");
                return Ok(());
            }
        };
        if snapshot.is_empty() {
            // Could be truly flat or a wholesale gap; never assume
            // everything closed off one empty reading.
            warn!("Snapshot empty, skipping sweep");
            return Ok(());
        }

        let mut closed = 0;
        for coin in self.reconciler.book().coins() {
            let live = snapshot.get(&coin).cloned();
            let transition = self
                .reconciler
                .reconcile(&self.client, &coin, live.as_ref())
                .await;
            if matches!(transition, Transition::Close { .. }) {
                closed += 1;
            }
            self.emit(transition).await;
        }

        if closed > 0 {
            info!(closed, "Sweep confirmed closed positions");
        }
        Ok(())
    }

    /// Render and deliver an alertable transition, persisting the table
    /// when the evaluation actually changed it.
    async fn emit(&mut self, transition: Transition) {
        let transition = match transition {
            Transition::Close { coin, mut position } => {
                // Prefer a live exit price over the last tracked mark.
                if let Ok(Some(mid)) = self.client.fetch_mid_price(&coin).await {
                    position.current_price = mid;
                }
                Transition::Close { coin, position }
            }
            other => other,
        };

        if transition.is_alertable() {
            self.refresh_btc_price().await;
            if let Some(message) = render::render_transition(&self.alert_ctx, &transition) {
                self.notifier.send(&message).await;
            }
        }
        if self.reconciler.take_dirty() {
            self.persist();
        }
    }

    /// Seed the table from ground truth at startup.
    ///
    /// Only positions at or above the minimum value enter the table here
    /// (the one place the threshold gates membership). An empty or failed
    /// snapshot leaves the persisted beliefs untouched.
    async fn sync_startup(&mut self) {
        info!("Syncing with current positions");
        match self.client.fetch_positions().await {
            Ok(snapshot) if !snapshot.is_empty() => {
                let mut synced = 0;
                for (coin, live) in &snapshot {
                    if live.value >= self.config.min_position_value {
                        info!(coin = %coin, side = %live.side, value = %live.value, "Found position");
                        self.reconciler
                            .book_mut()
                            .insert(coin.clone(), Position::from_live(live));
                        synced += 1;
                    }
                }
                if synced > 0 {
                    self.persist();
                }
                info!(synced, "Startup position sync complete");
            }
            Ok(_) => info!("No positions in snapshot, keeping persisted beliefs"),
            Err(e) => warn!(%e, "Startup sync failed, keeping persisted beliefs"),
        }
    }

    /// Poll delay with exponential backoff on a failure streak.
    fn poll_delay(&self, error_streak: u32) -> Duration {
        let base = self.config.check_interval();
        if error_streak == 0 {
            return base;
        }
        let factor = 2u32.pow(error_streak.min(MAX_BACKOFF_EXP));
        (base * factor).min(self.config.max_backoff())
    }

    fn log_status(&self, cycle: u64, aggregator: &FillAggregator) {
        let book = self.reconciler.book();
        if cycle % POSITION_LOG_CYCLES == 0 && !book.is_empty() {
            info!(
                open = book.len(),
                total_value = %book.total_value(),
                "Tracked positions"
            );
        }
        if cycle % PENDING_LOG_CYCLES == 0 {
            for (key, count, notional) in aggregator.pending_summary() {
                info!(key = %key, fills = count, notional = %notional, "Pending fill batch");
            }
        }
    }

    async fn refresh_btc_price(&mut self) {
        if let Ok(Some(price)) = self.client.fetch_mid_price("BTC").await {
            self.alert_ctx.btc_price = price;
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(self.reconciler.book().as_map()) {
            warn!(%e, "Failed to persist positions");
        }
    }

    /// Flush state and send the best-effort summary notification.
    async fn shutdown(&mut self, aggregator: &mut FillAggregator) {
        aggregator.abort_timers();
        self.persist();

        let book = self.reconciler.book();
        if !book.is_empty() {
            let summary = render::render_shutdown(&self.alert_ctx, book.len(), book.total_value());
            self.notifier.send(&summary).await;
        }
        info!(open = book.len(), "Tracker stopped");
    }
}
