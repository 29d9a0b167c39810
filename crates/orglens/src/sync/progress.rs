//! Progress reporting types for sync operations.
//!
//! Library code never prints. Every phase boundary, retry, and per-record
//! failure is reported as a [`SyncProgress`] event; the CLI decides how to
//! render them.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::ItemKind;

/// Progress events emitted during sync operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to fetch repositories for an organization.
    FetchingRepos {
        /// The organization being synced.
        org: String,
    },

    /// Fetched a page of some paginated resource.
    FetchedPage {
        /// Resource label, e.g. `"search PaddlePaddle/Paddle"`.
        resource: String,
        /// Page number (1-indexed).
        page: u32,
        /// Number of nodes kept from this page.
        count: usize,
        /// Running total of nodes kept so far.
        total_so_far: usize,
    },

    /// Finished fetching a paginated resource.
    FetchComplete {
        /// Resource label.
        resource: String,
        /// Total number of nodes fetched.
        total: usize,
    },

    /// Starting detail enrichment for a batch of records.
    Enriching {
        /// Repository full name.
        repo: String,
        /// Number of records in the batch.
        count: usize,
        /// Worker pool size.
        workers: usize,
    },

    /// Failed to enrich a single record (record is kept with an error marker).
    EnrichError {
        /// Repository full name.
        repo: String,
        /// Kind of record.
        kind: ItemKind,
        /// Issue / pull request number.
        number: u64,
        /// Error message.
        error: String,
    },

    /// Failed to fetch the file list of a commit.
    CommitEnrichError {
        /// Repository full name.
        repo: String,
        /// Commit SHA.
        sha: String,
        /// Error message.
        error: String,
    },

    /// Enrichment batch complete.
    EnrichComplete {
        /// Repository full name.
        repo: String,
        /// Records enriched successfully.
        enriched: usize,
        /// Records left without detail.
        failed: usize,
    },

    /// Running the labeler over new records.
    Labeling {
        /// Repository (or organization) the records belong to.
        scope: String,
        /// Number of records to label.
        count: usize,
    },

    /// A collection was merged and written back to disk.
    Persisted {
        /// Collection label, e.g. `"prs PaddlePaddle/Paddle"`.
        collection: String,
        /// Records inserted.
        inserted: usize,
        /// Records updated in place.
        updated: usize,
    },

    /// Starting a sync window.
    WindowStarted {
        /// Inclusive start date.
        since: NaiveDate,
        /// Inclusive end date.
        until: NaiveDate,
    },

    /// A sync window completed and the checkpoint advanced.
    WindowComplete {
        /// Inclusive start date.
        since: NaiveDate,
        /// Inclusive end date.
        until: NaiveDate,
    },

    /// A sync window failed.
    WindowFailed {
        /// Inclusive start date.
        since: NaiveDate,
        /// Inclusive end date.
        until: NaiveDate,
        /// Error message.
        error: String,
        /// Pause before the next window, in milliseconds.
        cooldown_ms: u64,
    },

    /// Rate limit exhausted; all requests wait until the reset time.
    RateLimitWait {
        /// When the gate opens again.
        until: DateTime<Utc>,
        /// How long the current request is going to sleep (ms).
        wait_ms: u64,
    },

    /// Server error, backing off before retry.
    Backoff {
        /// What was being requested.
        operation: String,
        /// Time to wait before retry (ms).
        retry_after_ms: u64,
        /// Current attempt number.
        attempt: u32,
    },

    /// Network failure or malformed body, retrying after a fixed pause.
    NetworkRetry {
        /// What was being requested.
        operation: String,
        /// Consecutive failures so far.
        attempt: u32,
        /// Error message.
        error: String,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::FetchingRepos {
                org: "PaddlePaddle".to_string(),
            },
        );
        emit(
            Some(&callback),
            SyncProgress::FetchComplete {
                resource: "repos PaddlePaddle".to_string(),
                total: 10,
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_without_callback() {
        // Should not panic
        emit(
            None,
            SyncProgress::Warning {
                message: "ignored".to_string(),
            },
        );
    }

    #[test]
    fn test_sync_progress_enrich_error_debug() {
        let event = SyncProgress::EnrichError {
            repo: "o/r".to_string(),
            kind: ItemKind::PullRequest,
            number: 42,
            error: "Could not resolve to a PullRequest".to_string(),
        };

        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("EnrichError"));
        assert!(debug_str.contains("PullRequest"));
        assert!(debug_str.contains("42"));
    }

    #[test]
    fn test_emit_multiple_events_in_order() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);

        let callback: ProgressCallback = Box::new(move |event| {
            events_clone.lock().unwrap().push(format!("{:?}", event));
        });

        let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let until = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        emit(Some(&callback), SyncProgress::WindowStarted { since, until });
        emit(
            Some(&callback),
            SyncProgress::Persisted {
                collection: "issues o/r".to_string(),
                inserted: 2,
                updated: 1,
            },
        );
        emit(Some(&callback), SyncProgress::WindowComplete { since, until });

        let recorded = events.lock().unwrap();
        assert_eq!(recorded.len(), 3);
        assert!(recorded[0].contains("WindowStarted"));
        assert!(recorded[1].contains("Persisted"));
        assert!(recorded[2].contains("WindowComplete"));
    }
}
