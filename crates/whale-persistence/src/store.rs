//! JSON snapshot store for the position table.

use crate::error::PersistenceResult;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use whale_core::Position;

/// Reads and writes the position snapshot file.
///
/// Writes go through a sibling temp file plus rename, so an interrupted
/// save never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted position table.
    ///
    /// Any failure (missing file, unreadable, undecodable) falls back to an
    /// empty table: a cold start is acceptable, a crash here is not.
    pub fn load(&self) -> HashMap<String, Position> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No position snapshot, starting cold");
            return HashMap::new();
        }
        match self.try_load() {
            Ok(positions) => {
                info!(
                    path = %self.path.display(),
                    count = positions.len(),
                    "Loaded position snapshot"
                );
                positions
            }
            Err(e) => {
                warn!(%e, path = %self.path.display(), "Failed to load snapshot, starting cold");
                HashMap::new()
            }
        }
    }

    fn try_load(&self) -> PersistenceResult<HashMap<String, Position>> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the position table to disk.
    ///
    /// Failures are reported to the caller, which logs and continues:
    /// in-memory state stays authoritative for the current run.
    pub fn save(&self, positions: &HashMap<String, Position>) -> PersistenceResult<()> {
        let json = serde_json::to_string_pretty(positions)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use whale_core::PositionSide;

    fn temp_store(name: &str) -> PositionStore {
        let mut path = std::env::temp_dir();
        path.push(format!("whale_store_{name}_{}.json", std::process::id()));
        let _ = fs::remove_file(&path);
        PositionStore::new(path)
    }

    fn sample_position() -> Position {
        Position {
            side: PositionSide::Long,
            size: dec!(100),
            value: dec!(150000),
            max_value: dec!(150000),
            avg_price: dec!(1500),
            current_price: dec!(1500),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let store = temp_store("missing");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let store = temp_store("roundtrip");
        let mut positions = HashMap::new();
        positions.insert("ABC".to_string(), sample_position());

        store.save(&positions).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, positions);

        // Removal persists too.
        positions.remove("ABC");
        store.save(&positions).unwrap();
        assert!(store.load().is_empty());

        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let store = temp_store("corrupt");
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_empty());
        let _ = fs::remove_file(store.path());
    }
}
