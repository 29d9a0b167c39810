use orglens::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::FetchingRepos { org } => {
                tracing::info!(org = %org, "Fetching repositories");
            }

            SyncProgress::FetchedPage {
                resource,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(resource = %resource, page, count, total_so_far, "Fetched page");
            }

            SyncProgress::FetchComplete { resource, total } => {
                tracing::info!(resource = %resource, total, "Fetch complete");
            }

            SyncProgress::Enriching {
                repo,
                count,
                workers,
            } => {
                tracing::info!(repo = %repo, count, workers, "Enriching records");
            }

            SyncProgress::EnrichError {
                repo,
                kind,
                number,
                error,
            } => {
                tracing::warn!(repo = %repo, kind = %kind, number, error = %error, "Failed to enrich");
            }

            SyncProgress::CommitEnrichError { repo, sha, error } => {
                tracing::warn!(repo = %repo, sha = %sha, error = %error, "Failed to fetch commit files");
            }

            SyncProgress::EnrichComplete {
                repo,
                enriched,
                failed,
            } => {
                tracing::info!(repo = %repo, enriched, failed, "Enrichment complete");
            }

            SyncProgress::Labeling { scope, count } => {
                tracing::debug!(scope = %scope, count, "Labeling records");
            }

            SyncProgress::Persisted {
                collection,
                inserted,
                updated,
            } => {
                tracing::info!(collection = %collection, inserted, updated, "Saved");
            }

            SyncProgress::WindowStarted { since, until } => {
                tracing::info!(%since, %until, "Window started");
            }

            SyncProgress::WindowComplete { since, until } => {
                tracing::info!(%since, %until, "Window complete, checkpoint advanced");
            }

            SyncProgress::WindowFailed {
                since,
                until,
                error,
                cooldown_ms,
            } => {
                tracing::error!(%since, %until, error = %error, cooldown_ms, "Window failed");
            }

            SyncProgress::RateLimitWait { until, wait_ms } => {
                tracing::warn!(%until, wait_ms, "Rate limit exhausted, waiting for reset");
            }

            SyncProgress::Backoff {
                operation,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    operation = %operation,
                    retry_after_ms,
                    attempt,
                    "Server error, backing off"
                );
            }

            SyncProgress::NetworkRetry {
                operation,
                attempt,
                error,
            } => {
                tracing::warn!(operation = %operation, attempt, error = %error, "Network error, retrying");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}
