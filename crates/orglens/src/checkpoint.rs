//! Sync checkpoint and window planning.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::store::{CollectionStore, StoreError, read_json, write_json};

/// Last day up to which every collection is known to be current.
///
/// Stored as `{"data_update_time": "YYYY-MM-DD"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    #[serde(rename = "data_update_time")]
    pub synced_until: NaiveDate,
}

impl SyncCheckpoint {
    pub fn new(synced_until: NaiveDate) -> Self {
        Self { synced_until }
    }

    /// Load the checkpoint; `None` before the first completed window.
    pub async fn load(store: &CollectionStore) -> Result<Option<Self>, StoreError> {
        read_json(&store.checkpoint_path()).await
    }

    pub async fn save(&self, store: &CollectionStore) -> Result<(), StoreError> {
        write_json(&store.checkpoint_path(), self).await
    }
}

/// One incremental sync window; both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

/// Split `[since, until]` into windows starting every `step_days` days.
///
/// Each window ends where the next one starts, so boundary days are
/// fetched twice; merging makes that harmless. An empty or inverted range
/// yields no windows.
pub fn plan_windows(since: NaiveDate, until: NaiveDate, step_days: i64) -> Vec<SyncWindow> {
    let step = step_days.max(1);
    let days = (until - since).num_days();

    (0..days)
        .step_by(step as usize)
        .map(|offset| {
            let start = since + Duration::days(offset);
            SyncWindow {
                since: start,
                until: (start + Duration::days(step)).min(until),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_plan_windows_weekly() {
        let windows = plan_windows(date(2025, 10, 1), date(2025, 10, 17), 7);
        assert_eq!(
            windows,
            vec![
                SyncWindow { since: date(2025, 10, 1), until: date(2025, 10, 8) },
                SyncWindow { since: date(2025, 10, 8), until: date(2025, 10, 15) },
                SyncWindow { since: date(2025, 10, 15), until: date(2025, 10, 17) },
            ]
        );
    }

    #[test]
    fn test_plan_windows_empty_and_inverted() {
        assert!(plan_windows(date(2025, 1, 1), date(2025, 1, 1), 7).is_empty());
        assert!(plan_windows(date(2025, 1, 9), date(2025, 1, 1), 7).is_empty());
    }

    #[test]
    fn test_plan_windows_single_short_window() {
        let windows = plan_windows(date(2025, 1, 1), date(2025, 1, 3), 7);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].until, date(2025, 1, 3));
    }

    #[test]
    fn test_checkpoint_json_shape() {
        let checkpoint = SyncCheckpoint::new(date(2025, 10, 24));
        assert_eq!(
            serde_json::to_value(checkpoint).unwrap(),
            serde_json::json!({ "data_update_time": "2025-10-24" })
        );
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path());
        assert!(SyncCheckpoint::load(&store).await.unwrap().is_none());

        SyncCheckpoint::new(date(2025, 3, 1)).save(&store).await.unwrap();
        let loaded = SyncCheckpoint::load(&store).await.unwrap();
        assert_eq!(loaded.map(|c| c.synced_until), Some(date(2025, 3, 1)));
    }
}
