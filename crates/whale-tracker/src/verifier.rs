//! Close verification with retry.
//!
//! The polled snapshot source occasionally returns a transient gap where an
//! open position is briefly missing. Declaring a close off a single absent
//! reading is the dominant false-alert mode, so absence must be sustained
//! across the full attempt budget before a close is confirmed, while a
//! single positive sighting is enough to abort verification immediately.

use std::time::Duration;
use tracing::{debug, info, warn};
use whale_core::PositionSource;

/// Default number of snapshot checks before a close is confirmed.
pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;

/// Default delay between verification attempts.
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(5);

/// Re-polls ground truth before any CLOSE is committed.
#[derive(Debug, Clone)]
pub struct CloseVerifier {
    attempts: u32,
    delay: Duration,
}

impl CloseVerifier {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Verify that `coin` is really closed.
    ///
    /// Returns `false` (not closed) on the first snapshot containing the
    /// instrument. A failed fetch observes nothing and is never evidence of
    /// closure: non-final failures are retried, and a failure on the final
    /// attempt leaves the close unconfirmed (the next sweep retries). A
    /// wholesale-empty snapshot on a non-final attempt is likewise
    /// inconclusive. Only sustained absence confirms the close.
    pub async fn verify_closed(&self, source: &dyn PositionSource, coin: &str) -> bool {
        debug!(coin, attempts = self.attempts, "Verifying position close");

        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.delay).await;
            }

            let final_attempt = attempt + 1 == self.attempts;
            let snapshot = match source.current_positions().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(coin, attempt = attempt + 1, %e, "Snapshot fetch failed during close verification");
                    if final_attempt {
                        info!(coin, "Snapshot unavailable on final attempt, close not confirmed");
                        return false;
                    }
                    continue;
                }
            };

            if snapshot.is_empty() && !final_attempt {
                debug!(
                    coin,
                    attempt = attempt + 1,
                    "Empty snapshot, inconclusive; retrying"
                );
                continue;
            }

            if let Some(live) = snapshot.get(coin) {
                info!(coin, side = %live.side, value = %live.value, "Position still exists, close not confirmed");
                return false;
            }
        }

        info!(coin, "Position close confirmed");
        true
    }
}

impl Default for CloseVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFY_ATTEMPTS, DEFAULT_VERIFY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use whale_core::{LivePosition, PositionMap, PositionSide, SourceError};

    /// Stub source replaying a fixed sequence of snapshot results; the
    /// last entry repeats once the sequence is exhausted.
    struct ScriptedSource {
        script: Mutex<Vec<Result<PositionMap, SourceError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<PositionMap, SourceError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PositionSource for ScriptedSource {
        async fn current_positions(&self) -> Result<PositionMap, SourceError> {
            let mut script = self.script.lock().unwrap();
            self.calls.fetch_add(1, Ordering::SeqCst);
            if script.len() > 1 {
                script.remove(0)
            } else {
                match script.first() {
                    Some(Ok(map)) => Ok(map.clone()),
                    Some(Err(_)) => Err(SourceError::Transport("down".into())),
                    None => Ok(PositionMap::new()),
                }
            }
        }
    }

    fn with_btc() -> PositionMap {
        let mut map = PositionMap::new();
        map.insert(
            "BTC".to_string(),
            LivePosition {
                size: dec!(1),
                side: PositionSide::Long,
                value: dec!(60000),
                avg_price: dec!(60000),
                current_price: dec!(60000),
            },
        );
        map
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_then_present_is_not_closed() {
        // Attempt 1 sees a gap, attempt 2 sees the position: not closed.
        let source = ScriptedSource::new(vec![Ok(PositionMap::new()), Ok(with_btc())]);
        let verifier = CloseVerifier::default();
        assert!(!verifier.verify_closed(&source, "BTC").await);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_absence_confirms_close() {
        let mut only_eth = PositionMap::new();
        only_eth.insert(
            "ETH".to_string(),
            LivePosition {
                size: dec!(10),
                side: PositionSide::Short,
                value: dec!(30000),
                avg_price: dec!(3000),
                current_price: dec!(3000),
            },
        );
        let source = ScriptedSource::new(vec![Ok(only_eth)]);
        let verifier = CloseVerifier::default();
        assert!(verifier.verify_closed(&source, "BTC").await);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_on_first_attempt_short_circuits() {
        let source = ScriptedSource::new(vec![Ok(with_btc())]);
        let verifier = CloseVerifier::default();
        assert!(!verifier.verify_closed(&source, "BTC").await);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failures_are_retried_not_counted() {
        // Two failures then a sighting: still not closed.
        let source = ScriptedSource::new(vec![
            Err(SourceError::Transport("timeout".into())),
            Err(SourceError::Transport("timeout".into())),
            Ok(with_btc()),
        ]);
        let verifier = CloseVerifier::default();
        assert!(!verifier.verify_closed(&source, "BTC").await);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_across_all_attempts_does_not_confirm_close() {
        // An outage spanning the whole attempt budget observed nothing;
        // that must never confirm a close.
        let source = ScriptedSource::new(vec![
            Err(SourceError::Transport("timeout".into())),
            Err(SourceError::Transport("timeout".into())),
            Err(SourceError::Transport("timeout".into())),
        ]);
        let verifier = CloseVerifier::default();
        assert!(!verifier.verify_closed(&source, "BTC").await);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_on_final_attempt_is_inconclusive() {
        // Two absent readings, then the final fetch fails: the budget was
        // not completed with observations, so the close stays unconfirmed.
        let mut only_eth = PositionMap::new();
        only_eth.insert(
            "ETH".to_string(),
            LivePosition {
                size: dec!(10),
                side: PositionSide::Short,
                value: dec!(30000),
                avg_price: dec!(3000),
                current_price: dec!(3000),
            },
        );
        let source = ScriptedSource::new(vec![
            Ok(only_eth.clone()),
            Ok(only_eth),
            Err(SourceError::Transport("timeout".into())),
        ]);
        let verifier = CloseVerifier::default();
        assert!(!verifier.verify_closed(&source, "BTC").await);
        assert_eq!(source.calls(), 3);
    }
}
