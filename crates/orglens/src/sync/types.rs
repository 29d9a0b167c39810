//! Shared sync types and constants.

use std::time::Duration;

use chrono::NaiveDate;

/// Default number of concurrent detail-enrichment tasks.
pub const DEFAULT_ENRICH_WORKERS: usize = 9;

/// Default length of one incremental sync window, in days.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Maximum backoff delay in milliseconds for server errors.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum retries for a request answered with 502/503/504.
pub const MAX_SERVER_RETRIES: u32 = 5;

/// Fixed pause before retrying after a network failure or malformed body.
pub const NETWORK_RETRY_DELAY_MS: u64 = 2_000;

/// Extra wait added on top of the advertised rate-limit reset time.
pub const RATE_LIMIT_MARGIN_SECS: i64 = 5;

/// Buffer between the search stream and the enrichment pool.
pub const ITEM_CHANNEL_CAPACITY: usize = 100;

/// Pause after a failed sync window before the next one starts.
pub const WINDOW_FAILURE_COOLDOWN_SECS: u64 = 3_700;

/// Result of a sync operation over one repository or one collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// Number of records fetched from the remote API.
    pub fetched: usize,
    /// Number of records that were new to the store.
    pub inserted: usize,
    /// Number of existing records that were overwritten.
    pub updated: usize,
    /// Number of records whose enrichment failed (kept with an error marker).
    pub failed: usize,
    /// Errors encountered (non-fatal).
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Fold another result into this one.
    pub fn absorb(&mut self, other: SyncResult) {
        self.fetched += other.fetched;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }

    /// Count nodes the server returned that did not decode as failed items.
    pub fn record_malformed(&mut self, scope: &str, count: usize) {
        if count == 0 {
            return;
        }
        self.fetched += count;
        self.failed += count;
        self.errors.push(format!("{scope}: {count} malformed node(s) skipped"));
    }
}

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Organizations whose repositories are mirrored.
    pub orgs: Vec<String>,
    /// Maximum concurrent enrichment / labeling tasks.
    pub workers: usize,
    /// Length of one incremental window in days.
    pub window_days: i64,
    /// Pause after a failed window.
    pub window_failure_cooldown: Duration,
    /// First day to sync when no checkpoint exists yet.
    pub initial_since: Option<NaiveDate>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            orgs: Vec::new(),
            workers: DEFAULT_ENRICH_WORKERS,
            window_days: DEFAULT_WINDOW_DAYS,
            window_failure_cooldown: Duration::from_secs(WINDOW_FAILURE_COOLDOWN_SECS),
            initial_since: None,
        }
    }
}

/// Summary of a full windowed run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Windows that completed.
    pub windows_completed: usize,
    /// Windows that failed; the next run starts again from the first of them.
    pub windows_failed: usize,
    /// Checkpoint written by the run: the end of the last completed window
    /// before the first failure.
    pub checkpoint: Option<NaiveDate>,
    /// Aggregated per-record counts.
    pub result: SyncResult,
}
