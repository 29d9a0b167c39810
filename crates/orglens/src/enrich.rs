//! Concurrent detail enrichment.
//!
//! Issues and pull requests come back from search without their nested
//! sub-resources. Enrichment attaches them with a bounded pool of spawned
//! tasks, one task per record. A task that fails (or panics) leaves the
//! record's detail absent and sets its `error` marker; the record itself is
//! always kept, so a batch of N records yields N records.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};

use crate::github::{GitHubClient, GitHubError, short_error_message};
use crate::model::{
    Activity, CommitRecord, FileChange, IssueRecord, ItemKind, PullRequestRecord, TrackedItem,
};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Source of per-record detail.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn issue_comments(&self, repo: &str, number: u64) -> Result<Vec<Activity>, GitHubError>;

    async fn pull_request_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Activity>, GitHubError>;

    async fn pull_request_reviews(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Activity>, GitHubError>;

    async fn pull_request_commits(&self, repo: &str, number: u64)
    -> Result<Vec<String>, GitHubError>;

    async fn pull_request_files(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<FileChange>, GitHubError>;

    async fn commit_files(&self, repo: &str, sha: &str) -> Result<Vec<FileChange>, GitHubError>;
}

#[async_trait]
impl DetailSource for GitHubClient {
    async fn issue_comments(&self, repo: &str, number: u64) -> Result<Vec<Activity>, GitHubError> {
        GitHubClient::issue_comments(self, repo, number).await
    }

    async fn pull_request_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Activity>, GitHubError> {
        GitHubClient::pull_request_comments(self, repo, number).await
    }

    async fn pull_request_reviews(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Activity>, GitHubError> {
        GitHubClient::pull_request_reviews(self, repo, number).await
    }

    async fn pull_request_commits(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<String>, GitHubError> {
        GitHubClient::pull_request_commits(self, repo, number).await
    }

    async fn pull_request_files(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<FileChange>, GitHubError> {
        GitHubClient::pull_request_files(self, repo, number).await
    }

    async fn commit_files(&self, repo: &str, sha: &str) -> Result<Vec<FileChange>, GitHubError> {
        GitHubClient::commit_files(self, repo, sha).await
    }
}

/// Failure of a pooled task itself, as opposed to the work it ran.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool closed unexpectedly")]
    Closed,
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Run `task` over `inputs` on at most `workers` concurrent spawned tasks.
///
/// Results come back in input order.
pub async fn run_pool<I, R, F, Fut>(
    inputs: Vec<I>,
    workers: usize,
    task: F,
) -> Vec<Result<R, PoolError>>
where
    I: Send + 'static,
    R: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    if inputs.is_empty() {
        return Vec::new();
    }

    let workers = workers.clamp(1, inputs.len());
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut handles = Vec::with_capacity(inputs.len());

    for input in inputs {
        let semaphore = Arc::clone(&semaphore);
        let work = task(input);

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.map_err(|_| PoolError::Closed)?;
            Ok(work.await)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => Err(PoolError::Panicked(e.to_string())),
        });
    }
    results
}

/// Records after enrichment, with counts.
#[derive(Debug)]
pub struct EnrichOutcome<T> {
    pub records: Vec<T>,
    pub enriched: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl<T> Default for EnrichOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            enriched: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }
}

/// Detail fetched for one item.
#[derive(Debug)]
enum Details {
    Issue {
        comments: Vec<Activity>,
    },
    PullRequest {
        commits: Vec<String>,
        files: Vec<FileChange>,
        comments: Vec<Activity>,
        reviews: Vec<Activity>,
    },
}

async fn fetch_details<S>(
    source: &S,
    repo: &str,
    kind: ItemKind,
    number: u64,
) -> Result<Details, GitHubError>
where
    S: DetailSource + ?Sized,
{
    match kind {
        ItemKind::Issue => Ok(Details::Issue {
            comments: source.issue_comments(repo, number).await?,
        }),
        ItemKind::PullRequest => Ok(Details::PullRequest {
            commits: source.pull_request_commits(repo, number).await?,
            files: source.pull_request_files(repo, number).await?,
            comments: source.pull_request_comments(repo, number).await?,
            reviews: source.pull_request_reviews(repo, number).await?,
        }),
    }
}

fn apply_details(item: &mut TrackedItem, details: Details) {
    match (item, details) {
        (TrackedItem::Issue(IssueRecord { comment_by, .. }), Details::Issue { comments }) => {
            *comment_by = Some(comments);
        }
        (
            TrackedItem::PullRequest(PullRequestRecord {
                commits: pr_commits,
                files: pr_files,
                comment_by,
                review_by,
                ..
            }),
            Details::PullRequest {
                commits,
                files,
                comments,
                reviews,
            },
        ) => {
            *pr_commits = Some(commits);
            *pr_files = Some(files);
            *comment_by = Some(comments);
            *review_by = Some(reviews);
        }
        // Details are always fetched for the item's own kind.
        _ => {}
    }
}

fn mark_failed(item: &mut TrackedItem, message: &str) {
    let marker = Some(message.to_string());
    match item {
        TrackedItem::Issue(issue) => issue.error = marker,
        TrackedItem::PullRequest(pr) => pr.error = marker,
    }
}

impl EnrichOutcome<TrackedItem> {
    fn record(
        &mut self,
        repo: &str,
        mut item: TrackedItem,
        result: Result<Details, String>,
        on_progress: Option<&ProgressCallback>,
    ) {
        match result {
            Ok(details) => {
                apply_details(&mut item, details);
                self.enriched += 1;
            }
            Err(message) => {
                tracing::warn!(
                    "{}: failed to enrich {} #{}: {}",
                    repo,
                    item.kind(),
                    item.number(),
                    message
                );
                emit(
                    on_progress,
                    SyncProgress::EnrichError {
                        repo: repo.to_string(),
                        kind: item.kind(),
                        number: item.number(),
                        error: message.clone(),
                    },
                );
                mark_failed(&mut item, &message);
                self.errors
                    .push(format!("{} {} #{}: {}", repo, item.kind(), item.number(), message));
                self.failed += 1;
            }
        }
        self.records.push(item);
    }
}

fn flatten<T>(result: Result<Result<T, GitHubError>, PoolError>) -> Result<T, String> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(short_error_message(&e)),
        Err(e) => Err(e.to_string()),
    }
}

/// Attach comments (issues) or commits, files, comments, and reviews (pull
/// requests) to every item of a batch.
pub async fn enrich_items<S>(
    source: Arc<S>,
    repo: &str,
    items: Vec<TrackedItem>,
    workers: usize,
    on_progress: Option<&ProgressCallback>,
) -> EnrichOutcome<TrackedItem>
where
    S: DetailSource + ?Sized + 'static,
{
    emit(
        on_progress,
        SyncProgress::Enriching {
            repo: repo.to_string(),
            count: items.len(),
            workers,
        },
    );

    let keys: Vec<(ItemKind, u64)> = items.iter().map(|i| (i.kind(), i.number())).collect();
    let results = run_pool(keys, workers, |(kind, number)| {
        let source = Arc::clone(&source);
        let repo = repo.to_string();
        async move { fetch_details(source.as_ref(), &repo, kind, number).await }
    })
    .await;

    let mut outcome = EnrichOutcome::default();
    for (item, result) in items.into_iter().zip(results) {
        outcome.record(repo, item, flatten(result), on_progress);
    }

    finish(repo, &outcome, on_progress);
    outcome
}

/// Like [`enrich_items`], but starts each task as soon as its item arrives
/// on `rx`. Output order is arrival order.
pub async fn enrich_stream<S>(
    source: Arc<S>,
    repo: &str,
    mut rx: mpsc::Receiver<TrackedItem>,
    workers: usize,
    on_progress: Option<&ProgressCallback>,
) -> EnrichOutcome<TrackedItem>
where
    S: DetailSource + ?Sized + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut pending = Vec::new();

    while let Some(item) = rx.recv().await {
        // Waiting for a permit here holds back the producer once the pool is full.
        let permit = Arc::clone(&semaphore).acquire_owned().await;
        let source = Arc::clone(&source);
        let repo = repo.to_string();
        let (kind, number) = (item.kind(), item.number());

        let handle = tokio::spawn(async move {
            let _permit = permit.map_err(|_| PoolError::Closed)?;
            Ok(fetch_details(source.as_ref(), &repo, kind, number).await)
        });
        pending.push((item, handle));
    }

    let mut outcome = EnrichOutcome::default();
    for (item, handle) in pending {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(PoolError::Panicked(e.to_string())),
        };
        outcome.record(repo, item, flatten(result), on_progress);
    }

    finish(repo, &outcome, on_progress);
    outcome
}

/// Attach the REST file list to every commit of a batch.
pub async fn enrich_commits<S>(
    source: Arc<S>,
    repo: &str,
    commits: Vec<CommitRecord>,
    workers: usize,
    on_progress: Option<&ProgressCallback>,
) -> EnrichOutcome<CommitRecord>
where
    S: DetailSource + ?Sized + 'static,
{
    let shas: Vec<String> = commits.iter().map(|c| c.sha.clone()).collect();
    let results = run_pool(shas, workers, |sha| {
        let source = Arc::clone(&source);
        let repo = repo.to_string();
        async move { source.commit_files(&repo, &sha).await }
    })
    .await;

    let mut outcome = EnrichOutcome::default();
    for (mut commit, result) in commits.into_iter().zip(results) {
        match flatten(result) {
            Ok(files) => {
                commit.files = Some(files);
                outcome.enriched += 1;
            }
            Err(message) => {
                tracing::warn!("{}: failed to fetch files of {}: {}", repo, commit.sha, message);
                emit(
                    on_progress,
                    SyncProgress::CommitEnrichError {
                        repo: repo.to_string(),
                        sha: commit.sha.clone(),
                        error: message.clone(),
                    },
                );
                outcome.errors.push(format!("{} {}: {}", repo, commit.sha, message));
                commit.error = Some(message);
                outcome.failed += 1;
            }
        }
        outcome.records.push(commit);
    }

    finish(repo, &outcome, on_progress);
    outcome
}

fn finish<T>(repo: &str, outcome: &EnrichOutcome<T>, on_progress: Option<&ProgressCallback>) {
    tracing::debug!(
        "{}: enriched {} records, {} failed",
        repo,
        outcome.enriched,
        outcome.failed
    );
    emit(
        on_progress,
        SyncProgress::EnrichComplete {
            repo: repo.to_string(),
            enriched: outcome.enriched,
            failed: outcome.failed,
        },
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::fixtures::ts;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory detail source. Numbers in `failing` return a GraphQL
    /// error, numbers in `panicking` panic; every other number succeeds.
    #[derive(Default)]
    pub struct StubSource {
        pub failing: HashSet<u64>,
        pub panicking: HashSet<u64>,
        pub failing_shas: HashSet<String>,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub calls: Mutex<Vec<(String, u64)>>,
    }

    impl StubSource {
        async fn check(&self, what: &str, number: u64) -> Result<(), GitHubError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.calls
                .lock()
                .unwrap()
                .push((what.to_string(), number));
            if self.panicking.contains(&number) {
                panic!("stub panic for #{number}");
            }
            if self.failing.contains(&number) {
                return Err(GitHubError::GraphQl {
                    messages: vec![format!("cannot load #{number}")],
                });
            }
            Ok(())
        }

        fn activity(login: &str) -> Vec<Activity> {
            vec![Activity {
                author: Some(login.to_string()),
                at: ts(3, 0),
            }]
        }
    }

    #[async_trait]
    impl DetailSource for StubSource {
        async fn issue_comments(
            &self,
            _repo: &str,
            number: u64,
        ) -> Result<Vec<Activity>, GitHubError> {
            self.check("issue_comments", number).await?;
            Ok(Self::activity("commenter"))
        }

        async fn pull_request_comments(
            &self,
            _repo: &str,
            number: u64,
        ) -> Result<Vec<Activity>, GitHubError> {
            self.check("pr_comments", number).await?;
            Ok(Self::activity("commenter"))
        }

        async fn pull_request_reviews(
            &self,
            _repo: &str,
            number: u64,
        ) -> Result<Vec<Activity>, GitHubError> {
            self.check("pr_reviews", number).await?;
            Ok(Self::activity("reviewer"))
        }

        async fn pull_request_commits(
            &self,
            _repo: &str,
            number: u64,
        ) -> Result<Vec<String>, GitHubError> {
            self.check("pr_commits", number).await?;
            Ok(vec![format!("sha-{number}")])
        }

        async fn pull_request_files(
            &self,
            _repo: &str,
            number: u64,
        ) -> Result<Vec<FileChange>, GitHubError> {
            self.check("pr_files", number).await?;
            Ok(vec![FileChange {
                filename: "paddle/phi/kernels/add.cc".to_string(),
                status: "modified".to_string(),
                additions: 2,
                deletions: 1,
                changes: 3,
            }])
        }

        async fn commit_files(
            &self,
            _repo: &str,
            sha: &str,
        ) -> Result<Vec<FileChange>, GitHubError> {
            if self.failing_shas.contains(sha) {
                return Err(GitHubError::Status {
                    status: 404,
                    message: "Not Found".to_string(),
                });
            }
            Ok(vec![FileChange {
                filename: format!("python/{sha}.py"),
                status: "added".to_string(),
                additions: 1,
                deletions: 0,
                changes: 1,
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::StubSource;
    use super::*;
    use crate::model::fixtures::{commit, issue, pull_request};
    use std::sync::atomic::Ordering;

    fn mixed_batch(n: u64) -> Vec<TrackedItem> {
        (1..=n)
            .map(|number| {
                if number % 2 == 0 {
                    TrackedItem::PullRequest(pull_request(number))
                } else {
                    TrackedItem::Issue(issue(number))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_run_pool_keeps_input_order() {
        let results = run_pool(vec![3u64, 1, 2], 2, |n| async move {
            tokio::task::yield_now().await;
            n * 10
        })
        .await;
        let values: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_run_pool_reports_panics() {
        let results = run_pool(vec![1u64, 2], 2, |n| async move {
            if n == 2 {
                panic!("boom");
            }
            n
        })
        .await;
        assert_eq!(results[0].as_ref().unwrap(), &1);
        assert!(matches!(results[1], Err(PoolError::Panicked(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_bound_is_respected() {
        let source = Arc::new(StubSource::default());
        let outcome = enrich_items(
            Arc::clone(&source),
            "o/r",
            (1..=20).map(|n| TrackedItem::Issue(issue(n))).collect(),
            3,
            None,
        )
        .await;

        assert_eq!(outcome.enriched, 20);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_one_failure_in_ten_keeps_all_records() {
        let source = Arc::new(StubSource {
            failing: [7].into_iter().collect(),
            ..StubSource::default()
        });

        let outcome = enrich_items(source, "o/r", mixed_batch(10), 9, None).await;

        assert_eq!(outcome.records.len(), 10);
        assert_eq!(outcome.enriched, 9);
        assert_eq!(outcome.failed, 1);

        for record in &outcome.records {
            match record {
                TrackedItem::Issue(issue) if issue.number == 7 => {
                    assert!(issue.comment_by.is_none());
                    assert!(issue.error.as_deref().unwrap().contains("cannot load #7"));
                }
                TrackedItem::Issue(issue) => {
                    assert_eq!(issue.comment_by.as_ref().unwrap().len(), 1);
                    assert!(issue.error.is_none());
                }
                TrackedItem::PullRequest(pr) => {
                    assert_eq!(pr.commits.as_ref().unwrap(), &vec![format!("sha-{}", pr.number)]);
                    assert_eq!(pr.files.as_ref().unwrap().len(), 1);
                    assert_eq!(pr.review_by.as_ref().unwrap()[0].author.as_deref(), Some("reviewer"));
                    assert!(pr.error.is_none());
                }
            }
        }

        let numbers: Vec<u64> = outcome.records.iter().map(TrackedItem::number).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_partial_pull_request_failure_attaches_nothing() {
        // Files succeed, the later review call fails: no detail is attached.
        struct ReviewsDown(StubSource);

        #[async_trait]
        impl DetailSource for ReviewsDown {
            async fn issue_comments(&self, r: &str, n: u64) -> Result<Vec<Activity>, GitHubError> {
                self.0.issue_comments(r, n).await
            }
            async fn pull_request_comments(
                &self,
                r: &str,
                n: u64,
            ) -> Result<Vec<Activity>, GitHubError> {
                self.0.pull_request_comments(r, n).await
            }
            async fn pull_request_reviews(
                &self,
                _r: &str,
                _n: u64,
            ) -> Result<Vec<Activity>, GitHubError> {
                Err(GitHubError::decode("reviews unavailable"))
            }
            async fn pull_request_commits(&self, r: &str, n: u64) -> Result<Vec<String>, GitHubError> {
                self.0.pull_request_commits(r, n).await
            }
            async fn pull_request_files(
                &self,
                r: &str,
                n: u64,
            ) -> Result<Vec<FileChange>, GitHubError> {
                self.0.pull_request_files(r, n).await
            }
            async fn commit_files(&self, r: &str, s: &str) -> Result<Vec<FileChange>, GitHubError> {
                self.0.commit_files(r, s).await
            }
        }

        let outcome = enrich_items(
            Arc::new(ReviewsDown(StubSource::default())),
            "o/r",
            vec![TrackedItem::PullRequest(pull_request(4))],
            2,
            None,
        )
        .await;

        match &outcome.records[0] {
            TrackedItem::PullRequest(pr) => {
                assert!(pr.files.is_none());
                assert!(pr.commits.is_none());
                assert!(pr.error.is_some());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_task_is_a_failed_record() {
        let source = Arc::new(StubSource {
            panicking: [2].into_iter().collect(),
            ..StubSource::default()
        });
        let outcome = enrich_items(source, "o/r", mixed_batch(3), 2, None).await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.records[1].error().unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_enrich_stream_preserves_arrival_order() {
        let source = Arc::new(StubSource {
            failing: [3].into_iter().collect(),
            ..StubSource::default()
        });
        let (tx, rx) = mpsc::channel(2);

        let producer = tokio::spawn(async move {
            for item in mixed_batch(6) {
                tx.send(item).await.unwrap();
            }
        });
        let outcome = enrich_stream(source, "o/r", rx, 2, None).await;
        producer.await.unwrap();

        let numbers: Vec<u64> = outcome.records.iter().map(TrackedItem::number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.records[2].error().is_some());
    }

    #[tokio::test]
    async fn test_enrich_commits_marks_failures() {
        let source = Arc::new(StubSource {
            failing_shas: ["bad".to_string()].into_iter().collect(),
            ..StubSource::default()
        });
        let commits = vec![
            commit("good", "Alice", "alice@example.com"),
            commit("bad", "Bob", "bob@example.com"),
        ];

        let outcome = enrich_commits(source, "o/r", commits, 9, None).await;
        assert_eq!(outcome.enriched, 1);
        assert_eq!(outcome.records[0].files.as_ref().unwrap()[0].filename, "python/good.py");
        assert!(outcome.records[1].files.is_none());
        assert!(outcome.records[1].error.is_some());
    }

    #[tokio::test]
    async fn test_progress_events_are_emitted() {
        use std::sync::Mutex;

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| sink.lock().unwrap().push(event));

        let source = Arc::new(StubSource {
            failing: [1].into_iter().collect(),
            ..StubSource::default()
        });
        enrich_items(source, "o/r", mixed_batch(2), 2, Some(&callback)).await;

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(SyncProgress::Enriching { count: 2, .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            SyncProgress::EnrichError { kind: ItemKind::Issue, number: 1, .. }
        )));
        assert!(matches!(
            events.last(),
            Some(SyncProgress::EnrichComplete { enriched: 1, failed: 1, .. })
        ));
    }
}
