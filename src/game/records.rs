//! Records Store
//!
//! Best time and high score per `(mode, arena)`, persisted as JSON under the
//! key `<mode>_<arena>`.

use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::bridge::storage::SharedStore;
use crate::game::collision::Arena;
use crate::game::mode::GameMode;

/// Persisted record for one `(mode, arena)` pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Best score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_score: Option<u32>,
    /// Best time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_time: Option<f32>,
}

/// Storage key of a record.
pub fn record_key(mode: GameMode, arena: Arena) -> String {
    format!("{}_{}", mode.as_str(), arena.as_str())
}

/// Records over a shared key-value store.
#[derive(Clone)]
pub struct RecordsStore {
    store: SharedStore,
}

impl RecordsStore {
    /// Wrap a store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Underlying store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Load a record; missing or corrupt entries read as empty.
    pub fn get(&self, mode: GameMode, arena: Arena) -> Record {
        let key = record_key(mode, arena);
        let Some(raw) = self.store.get(&key) else {
            return Record::default();
        };
        match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(%key, error = %e, "discarding corrupt record");
                Record::default()
            }
        }
    }

    fn put(&self, mode: GameMode, arena: Arena, record: &Record) -> bool {
        let key = record_key(mode, arena);
        match serde_json::to_string(record) {
            Ok(json) => {
                let ok = self.store.set(&key, &json);
                if !ok {
                    warn!(%key, "failed to persist record");
                }
                ok
            }
            Err(e) => {
                warn!(%key, error = %e, "failed to serialize record");
                false
            }
        }
    }

    /// High score, 0 when none.
    pub fn get_high_score(&self, mode: GameMode, arena: Arena) -> u32 {
        self.get(mode, arena).high_score.unwrap_or(0)
    }

    /// Best time, if any.
    pub fn get_best_time(&self, mode: GameMode, arena: Arena) -> Option<f32> {
        self.get(mode, arena).best_time
    }

    /// Store `score` if it beats the current high score. Returns `true` when
    /// a new record was written.
    pub fn set_high_score(&self, mode: GameMode, score: u32, arena: Arena) -> bool {
        let mut record = self.get(mode, arena);
        if record.high_score.is_some_and(|best| score <= best) {
            return false;
        }
        record.high_score = Some(score);
        let written = self.put(mode, arena, &record);
        if written {
            info!(mode = %mode, arena = %arena, score, "new high score");
        }
        written
    }

    /// Store `time` if it beats the current best for the mode: lower wins in
    /// time-trial, higher wins in survival. Other modes keep no best time.
    /// Returns `true` when a new record was written.
    pub fn set_best_time(&self, mode: GameMode, time: f32, arena: Arena) -> bool {
        if !time.is_finite() || time < 0.0 {
            return false;
        }
        let mut record = self.get(mode, arena);
        let better = match (mode, record.best_time) {
            (GameMode::TimeTrial, Some(best)) => time < best,
            (GameMode::Survival, Some(best)) => time > best,
            (GameMode::TimeTrial | GameMode::Survival, None) => true,
            _ => false,
        };
        if !better {
            return false;
        }
        record.best_time = Some(time);
        let written = self.put(mode, arena, &record);
        if written {
            info!(mode = %mode, arena = %arena, time, "new best time");
        }
        written
    }
}

impl std::fmt::Debug for RecordsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordsStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::storage::MemoryStore;
    use proptest::prelude::*;

    fn records() -> RecordsStore {
        RecordsStore::new(MemoryStore::shared())
    }

    #[test]
    fn test_record_key_format() {
        assert_eq!(record_key(GameMode::TimeTrial, Arena::Standard), "time-trial_standard");
        assert_eq!(record_key(GameMode::Collection, Arena::Large), "collection_large");
    }

    #[test]
    fn test_records_segregated_by_arena() {
        let r = records();
        assert!(r.set_high_score(GameMode::Collection, 100, Arena::Standard));
        assert_eq!(r.get_high_score(GameMode::Collection, Arena::Large), 0);
        assert_eq!(r.get_high_score(GameMode::Collection, Arena::Standard), 100);
    }

    #[test]
    fn test_high_score_only_increases() {
        let r = records();
        assert!(r.set_high_score(GameMode::Shooting, 50, Arena::Standard));
        assert!(!r.set_high_score(GameMode::Shooting, 40, Arena::Standard));
        assert_eq!(r.get_high_score(GameMode::Shooting, Arena::Standard), 50);
    }

    #[test]
    fn test_json_format() {
        let r = records();
        r.set_best_time(GameMode::TimeTrial, 42.5, Arena::Standard);
        let raw = r.store().get("time-trial_standard").unwrap();
        assert_eq!(raw, r#"{"bestTime":42.5}"#);
    }

    #[test]
    fn test_corrupt_record_reads_empty() {
        let r = records();
        r.store().set("survival_standard", "{oops");
        assert_eq!(r.get(GameMode::Survival, Arena::Standard), Record::default());
    }

    #[test]
    fn test_free_play_keeps_no_time() {
        let r = records();
        assert!(!r.set_best_time(GameMode::FreePlay, 3.0, Arena::Standard));
        assert_eq!(r.get_best_time(GameMode::FreePlay, Arena::Standard), None);
    }

    proptest! {
        #[test]
        fn test_time_trial_keeps_min(times in proptest::collection::vec(0.1f32..500.0, 1..20)) {
            let r = records();
            for t in &times {
                r.set_best_time(GameMode::TimeTrial, *t, Arena::Standard);
            }
            let min = times.iter().cloned().fold(f32::INFINITY, f32::min);
            prop_assert_eq!(r.get_best_time(GameMode::TimeTrial, Arena::Standard), Some(min));
        }

        #[test]
        fn test_survival_keeps_max(times in proptest::collection::vec(0.1f32..500.0, 1..20)) {
            let r = records();
            for t in &times {
                r.set_best_time(GameMode::Survival, *t, Arena::Large);
            }
            let max = times.iter().cloned().fold(0.0f32, f32::max);
            prop_assert_eq!(r.get_best_time(GameMode::Survival, Arena::Large), Some(max));
        }
    }
}
