//! Sync engine: fetch, enrich, label, merge, persist.
//!
//! One [`SyncEngine`] owns the client, the store, and the labeler for a run.
//! Repositories are processed one at a time; within a repository the search
//! stream feeds the enrichment pool as pages arrive.
//!
//! ```ignore
//! use orglens::sync::{SyncEngine, SyncOptions};
//!
//! let engine = SyncEngine::new(client, store, labeler, options);
//! let summary = engine.run(until).await?;
//! println!("{} windows done", summary.windows_completed);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use super::error::SyncError;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{ITEM_CHANNEL_CAPACITY, RunSummary, SyncOptions, SyncResult};
use crate::checkpoint::{SyncCheckpoint, SyncWindow, plan_windows};
use crate::enrich::{DetailSource, enrich_commits, enrich_items, enrich_stream};
use crate::github::{GitHubClient, short_error_message};
use crate::identity::{self, IdentityConfig};
use crate::labeling::{
    FALLBACK_LABEL, Labeler, assign_domains, categorize_pull_requests, label_commits,
};
use crate::model::TrackedItem;
use crate::store::{
    CollectionStore, MergeOutcome, merge_commits, merge_items, merge_repositories, split_new,
};
use crate::weights::{self, ModuleWeights};

pub struct SyncEngine {
    client: GitHubClient,
    source: Arc<dyn DetailSource>,
    store: CollectionStore,
    labeler: Arc<dyn Labeler>,
    options: SyncOptions,
    identity: IdentityConfig,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl SyncEngine {
    pub fn new(
        client: GitHubClient,
        store: CollectionStore,
        labeler: Arc<dyn Labeler>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source: Arc::new(client.clone()),
            client,
            store,
            labeler,
            options,
            identity: IdentityConfig::default(),
            on_progress: None,
        }
    }

    /// Fetch per-record detail from `source` instead of the client.
    #[must_use]
    pub fn with_detail_source(mut self, source: Arc<dyn DetailSource>) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    fn progress(&self) -> Option<&ProgressCallback> {
        self.on_progress.as_deref()
    }

    fn persisted(&self, collection: String, outcome: MergeOutcome) {
        tracing::info!(
            "{}: {} inserted, {} updated",
            collection,
            outcome.inserted,
            outcome.updated
        );
        emit(
            self.progress(),
            SyncProgress::Persisted {
                collection,
                inserted: outcome.inserted,
                updated: outcome.updated,
            },
        );
    }

    /// Refresh the repository collection of every configured organization.
    ///
    /// Repositories created after `until` are skipped. Repositories without
    /// a domain tag (new ones, and any that failed before) are labeled.
    #[tracing::instrument(skip(self), fields(orgs = self.options.orgs.len()))]
    pub async fn sync_repositories(&self, until: Option<NaiveDate>) -> Result<SyncResult, SyncError> {
        let mut fetched = Vec::new();
        let mut malformed = 0;
        for org in &self.options.orgs {
            emit(
                self.progress(),
                SyncProgress::FetchingRepos { org: org.clone() },
            );
            let page = self.client.list_org_repos(org, until, self.progress()).await;
            if let Some(e) = page.error {
                return Err(SyncError::incomplete(format!("repos {org}"), e));
            }
            malformed += page.malformed;
            fetched.extend(page.items);
        }

        let mut result = SyncResult {
            fetched: fetched.len(),
            ..SyncResult::default()
        };
        result.record_malformed("repos", malformed);

        let mut repos = self.store.load_repositories().await?;
        let outcome = merge_repositories(&mut repos, fetched);

        let unlabeled: Vec<usize> = repos
            .iter()
            .enumerate()
            .filter(|(_, r)| r.domain.is_none())
            .map(|(i, _)| i)
            .collect();
        if !unlabeled.is_empty() {
            let batch = unlabeled.iter().map(|&i| repos[i].clone()).collect();
            let labeled = assign_domains(
                Arc::clone(&self.labeler),
                batch,
                self.options.workers,
                self.progress(),
            )
            .await;
            for (i, repo) in unlabeled.into_iter().zip(labeled) {
                repos[i] = repo;
            }
        }

        self.store.save_repositories(&repos).await?;
        self.persisted("repos".to_string(), outcome);

        result.inserted = outcome.inserted;
        result.updated = outcome.updated;
        Ok(result)
    }

    /// Incremental issue / pull request sync of one repository.
    #[tracing::instrument(skip(self))]
    pub async fn sync_items(
        &self,
        repo: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<SyncResult, SyncError> {
        let (tx, rx) = mpsc::channel(ITEM_CHANNEL_CAPACITY);

        let producer = self
            .client
            .search_items_streaming(repo, since, until, tx, self.progress());
        let consumer = enrich_stream(
            Arc::clone(&self.source),
            repo,
            rx,
            self.options.workers,
            self.progress(),
        );
        let (summary, outcome) = tokio::join!(producer, consumer);

        let mut result = SyncResult {
            fetched: outcome.records.len(),
            failed: outcome.failed,
            errors: outcome.errors,
            ..SyncResult::default()
        };
        result.record_malformed(&format!("search {repo}"), summary.malformed);
        result.absorb(self.persist_items(repo, outcome.records).await?);

        match summary.error {
            Some(e) => Err(SyncError::incomplete(format!("search {repo}"), e)),
            None => Ok(result),
        }
    }

    /// Full (unbounded) issue / pull request fetch of one repository.
    #[tracing::instrument(skip(self))]
    pub async fn onboard_items(&self, repo: &str) -> Result<SyncResult, SyncError> {
        let page = self.client.fetch_all_items(repo, self.progress()).await?;

        let outcome = enrich_items(
            Arc::clone(&self.source),
            repo,
            page.items,
            self.options.workers,
            self.progress(),
        )
        .await;

        let mut result = SyncResult {
            fetched: outcome.records.len(),
            failed: outcome.failed,
            errors: outcome.errors,
            ..SyncResult::default()
        };
        result.record_malformed(&format!("items {repo}"), page.malformed);
        result.absorb(self.persist_items(repo, outcome.records).await?);

        match page.error {
            Some(e) => Err(SyncError::incomplete(format!("items {repo}"), e)),
            None => Ok(result),
        }
    }

    /// Merge enriched items into the issue and pull request collections.
    ///
    /// Only pull requests new to the store are categorized. A stored pull
    /// request that never got a category is defaulted to
    /// [`FALLBACK_LABEL`] when it is refreshed.
    async fn persist_items(
        &self,
        repo: &str,
        items: Vec<TrackedItem>,
    ) -> Result<SyncResult, SyncError> {
        let (issues, prs) = TrackedItem::partition(items);
        let mut result = SyncResult::default();

        let mut stored_issues = self.store.load_issues(repo).await?;
        let outcome = merge_items(&mut stored_issues, issues);
        self.store.save_issues(repo, &stored_issues).await?;
        self.persisted(format!("issues {repo}"), outcome);
        result.inserted += outcome.inserted;
        result.updated += outcome.updated;

        let mut stored_prs = self.store.load_pull_requests(repo).await?;
        let (updates, new) = split_new(&stored_prs, prs);
        let new = categorize_pull_requests(
            Arc::clone(&self.labeler),
            repo,
            new,
            self.options.workers,
            self.progress(),
        )
        .await;

        let refreshed_numbers: HashSet<u64> = updates.iter().map(|pr| pr.number).collect();
        let refreshed = merge_items(&mut stored_prs, updates);
        for pr in stored_prs
            .iter_mut()
            .filter(|pr| pr.category.is_none() && refreshed_numbers.contains(&pr.number))
        {
            pr.category = Some(FALLBACK_LABEL.to_string());
        }
        let added = merge_items(&mut stored_prs, new);
        self.store.save_pull_requests(repo, &stored_prs).await?;

        let outcome = MergeOutcome {
            inserted: added.inserted,
            updated: refreshed.updated,
        };
        self.persisted(format!("prs {repo}"), outcome);
        result.inserted += outcome.inserted;
        result.updated += outcome.updated;

        Ok(result)
    }

    /// Default-branch commits of one repository in a window.
    ///
    /// Commits already stored are skipped before any file lookup.
    #[tracing::instrument(skip(self))]
    pub async fn sync_commits(
        &self,
        repo: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<SyncResult, SyncError> {
        let history = self
            .client
            .commit_history(repo, since, until, self.progress())
            .await?;

        let mut stored = self.store.load_commits(repo).await?;
        let fetched = history.items.len();
        let (_, new) = split_new(&stored, history.items);

        let enriched = enrich_commits(
            Arc::clone(&self.source),
            repo,
            new,
            self.options.workers,
            self.progress(),
        )
        .await;
        let labeled = label_commits(
            Arc::clone(&self.labeler),
            repo,
            enriched.records,
            self.options.workers,
            self.progress(),
        )
        .await;

        let outcome = merge_commits(&mut stored, labeled);
        self.store.save_commits(repo, &stored).await?;
        self.persisted(format!("commits {repo}"), outcome);

        let mut result = SyncResult {
            fetched,
            inserted: outcome.inserted,
            updated: 0,
            failed: enriched.failed,
            errors: enriched.errors,
        };
        result.record_malformed(&format!("commits {repo}"), history.malformed);

        match history.error {
            Some(e) => Err(SyncError::incomplete(format!("commits {repo}"), e)),
            None => Ok(result),
        }
    }

    /// Recompute module weights from every stored commit collection.
    #[tracing::instrument(skip(self))]
    pub async fn update_module_weights(&self) -> Result<ModuleWeights, SyncError> {
        let weights = weights::rebuild(&self.store).await?;
        tracing::info!("module weights updated for {} repositories", weights.len());
        Ok(weights)
    }

    /// Community developer names of one repository, from its stored commits.
    pub async fn community_developers(&self, repo: &str) -> Result<Vec<String>, SyncError> {
        let commits = self.store.load_commits(repo).await?;
        Ok(identity::community_developers(&commits, &self.identity))
    }

    async fn run_window(&self, window: SyncWindow) -> Result<SyncResult, SyncError> {
        let mut result = self.sync_repositories(Some(window.until)).await?;

        for repo in self.store.load_repositories().await? {
            let name = repo.full_name;
            result.absorb(self.sync_items(&name, window.since, window.until).await?);
            result.absorb(self.sync_commits(&name, window.since, window.until).await?);
        }

        self.update_module_weights().await?;
        Ok(result)
    }

    /// Walk every window from the checkpoint up to `until`.
    ///
    /// The checkpoint advances after each completed window until the first
    /// failure; from then on later windows still sync but the checkpoint
    /// stays at the failed window's start, so the next run refetches it.
    /// A failed window waits out the rest of the failure cooldown, measured
    /// from the window's start.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, until: NaiveDate) -> Result<RunSummary, SyncError> {
        let since = match SyncCheckpoint::load(&self.store).await? {
            Some(checkpoint) => checkpoint.synced_until,
            None => self.options.initial_since.ok_or(SyncError::NoStartDate)?,
        };

        let windows = plan_windows(since, until, self.options.window_days);
        tracing::info!("{} windows from {} to {}", windows.len(), since, until);

        let mut summary = RunSummary::default();
        let mut contiguous = true;
        for window in windows {
            emit(
                self.progress(),
                SyncProgress::WindowStarted {
                    since: window.since,
                    until: window.until,
                },
            );
            let started = tokio::time::Instant::now();

            match self.run_window(window).await {
                Ok(result) => {
                    if contiguous {
                        SyncCheckpoint::new(window.until).save(&self.store).await?;
                        summary.checkpoint = Some(window.until);
                    }
                    summary.windows_completed += 1;
                    summary.result.absorb(result);
                    emit(
                        self.progress(),
                        SyncProgress::WindowComplete {
                            since: window.since,
                            until: window.until,
                        },
                    );
                }
                Err(e) => {
                    contiguous = false;
                    let message = short_error_message(&e);
                    let cooldown = self
                        .options
                        .window_failure_cooldown
                        .saturating_sub(started.elapsed());
                    tracing::error!(
                        "window {}..{} failed: {}; pausing {:?}",
                        window.since,
                        window.until,
                        message,
                        cooldown
                    );
                    emit(
                        self.progress(),
                        SyncProgress::WindowFailed {
                            since: window.since,
                            until: window.until,
                            error: message.clone(),
                            cooldown_ms: cooldown.as_millis() as u64,
                        },
                    );
                    summary.windows_failed += 1;
                    summary
                        .result
                        .errors
                        .push(format!("{}..{}: {}", window.since, window.until, message));
                    tokio::time::sleep(cooldown).await;
                }
            }
        }

        Ok(summary)
    }
}
