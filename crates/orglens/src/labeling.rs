//! Classification of new records.
//!
//! Labeling is the expensive step of a sync (typically a model call per
//! record), so it only runs on records that are new to the store and goes
//! through the same bounded pool as enrichment.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::enrich::{PoolError, run_pool};
use crate::model::{CommitRecord, PullRequestRecord, RepositoryRecord};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Category assigned when the labeler fails.
pub const FALLBACK_LABEL: &str = "others";

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("labeler unavailable: {0}")]
    Unavailable(String),
    #[error("labeler returned no usable label")]
    Empty,
}

/// External classifier for pull requests, commits, and repositories.
#[async_trait]
pub trait Labeler: Send + Sync {
    /// Category of a pull request from its title and body.
    async fn pull_request_category(&self, pr: &PullRequestRecord) -> Result<String, LabelError>;

    /// Why/what label of a commit message.
    async fn commit_label(&self, commit: &CommitRecord) -> Result<String, LabelError>;

    /// Domain tag of a repository.
    async fn repository_domain(&self, repo: &RepositoryRecord) -> Result<String, LabelError>;
}

/// Offline keyword labeler.
///
/// Pull requests are matched against an ordered list of `(word, category)`
/// rules on whole words only. Bracketed scope tags in the title (`[Docs]`)
/// are checked first, then the title and body; the first hit wins.
/// Commits are labeled by whether the message explains itself beyond the
/// subject line. Repositories take their first topic, then their language.
#[derive(Debug, Clone)]
pub struct KeywordLabeler {
    rules: Vec<(String, String)>,
}

impl Default for KeywordLabeler {
    fn default() -> Self {
        let table: [(&[&str], &str); 7] = [
            (&["fix", "fixes", "fixed", "fixing", "bug", "bugs", "bugfix", "hotfix"], "bug"),
            (&["doc", "docs", "document", "documentation", "typo", "typos", "readme"], "docs"),
            (&["test", "tests", "testing", "unittest", "unittests"], "test"),
            (&["ci", "workflow", "workflows"], "ci"),
            (&["perf", "performance", "speed", "speedup", "optimize", "optimization"], "performance"),
            (&["refactor", "refactoring", "cleanup", "clean"], "refactor"),
            (&["feat", "feature", "features", "add", "adds", "added", "support", "supports"], "feature"),
        ];
        Self::new(table.iter().flat_map(|(words, label)| {
            words.iter().map(|w| (w.to_string(), label.to_string()))
        }))
    }
}

impl KeywordLabeler {
    pub fn new(rules: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(keyword, label)| (keyword.to_lowercase(), label))
                .collect(),
        }
    }

    fn classify(&self, text: &str) -> Option<&str> {
        let tokens = words(text);
        self.rules
            .iter()
            .find(|(keyword, _)| tokens.iter().any(|w| w == keyword))
            .map(|(_, label)| label.as_str())
    }

    fn classify_pull_request(&self, title: &str, body: &str) -> Option<&str> {
        let tags: Vec<&str> = title
            .split('[')
            .skip(1)
            .filter_map(|rest| rest.split_once(']').map(|(tag, _)| tag))
            .collect();

        self.classify(&tags.join(" "))
            .or_else(|| self.classify(&format!("{title} {body}")))
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Labeler for KeywordLabeler {
    async fn pull_request_category(&self, pr: &PullRequestRecord) -> Result<String, LabelError> {
        let body = pr.body.as_deref().unwrap_or_default();
        Ok(self
            .classify_pull_request(&pr.title, body)
            .unwrap_or(FALLBACK_LABEL)
            .to_string())
    }

    async fn commit_label(&self, commit: &CommitRecord) -> Result<String, LabelError> {
        let mut lines = commit.message.lines().map(str::trim);
        let subject = lines.next().unwrap_or_default();
        let explained = lines.any(|line| !line.is_empty() && !is_trailer(line));

        let label = match (subject.is_empty(), explained) {
            (true, _) => return Err(LabelError::Empty),
            (false, true) => "why_what",
            (false, false) => "what",
        };
        Ok(label.to_string())
    }

    async fn repository_domain(&self, repo: &RepositoryRecord) -> Result<String, LabelError> {
        repo.topics
            .first()
            .cloned()
            .or_else(|| repo.language.clone())
            .ok_or(LabelError::Empty)
    }
}

/// `Signed-off-by:`-style trailers carry no rationale.
fn is_trailer(line: &str) -> bool {
    line.split_once(": ").is_some_and(|(key, _)| {
        !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

fn flatten(result: Result<Result<String, LabelError>, PoolError>) -> Result<String, String> {
    match result {
        Ok(Ok(label)) if !label.trim().is_empty() => Ok(label),
        Ok(Ok(_)) => Err(LabelError::Empty.to_string()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Assign a category to each pull request. Failures fall back to
/// [`FALLBACK_LABEL`].
pub async fn categorize_pull_requests<L>(
    labeler: Arc<L>,
    scope: &str,
    prs: Vec<PullRequestRecord>,
    workers: usize,
    on_progress: Option<&ProgressCallback>,
) -> Vec<PullRequestRecord>
where
    L: Labeler + ?Sized + 'static,
{
    emit(
        on_progress,
        SyncProgress::Labeling {
            scope: scope.to_string(),
            count: prs.len(),
        },
    );

    let inputs: Vec<PullRequestRecord> = prs.clone();
    let results = run_pool(inputs, workers, |pr| {
        let labeler = Arc::clone(&labeler);
        async move { labeler.pull_request_category(&pr).await }
    })
    .await;

    prs.into_iter()
        .zip(results)
        .map(|(mut pr, result)| {
            let category = flatten(result).unwrap_or_else(|e| {
                tracing::warn!("{}: labeling PR #{} failed: {}", scope, pr.number, e);
                FALLBACK_LABEL.to_string()
            });
            pr.category = Some(category);
            pr
        })
        .collect()
}

/// Assign a why/what label to each commit. Failures leave the label absent.
pub async fn label_commits<L>(
    labeler: Arc<L>,
    scope: &str,
    commits: Vec<CommitRecord>,
    workers: usize,
    on_progress: Option<&ProgressCallback>,
) -> Vec<CommitRecord>
where
    L: Labeler + ?Sized + 'static,
{
    emit(
        on_progress,
        SyncProgress::Labeling {
            scope: scope.to_string(),
            count: commits.len(),
        },
    );

    let results = run_pool(commits.clone(), workers, |commit| {
        let labeler = Arc::clone(&labeler);
        async move { labeler.commit_label(&commit).await }
    })
    .await;

    commits
        .into_iter()
        .zip(results)
        .map(|(mut commit, result)| {
            match flatten(result) {
                Ok(label) => commit.why_what_label = Some(label),
                Err(e) => tracing::warn!("{}: labeling commit {} failed: {}", scope, commit.sha, e),
            }
            commit
        })
        .collect()
}

/// Assign a domain tag to each repository. Failures fall back to
/// [`FALLBACK_LABEL`].
pub async fn assign_domains<L>(
    labeler: Arc<L>,
    repos: Vec<RepositoryRecord>,
    workers: usize,
    on_progress: Option<&ProgressCallback>,
) -> Vec<RepositoryRecord>
where
    L: Labeler + ?Sized + 'static,
{
    emit(
        on_progress,
        SyncProgress::Labeling {
            scope: "repositories".to_string(),
            count: repos.len(),
        },
    );

    let results = run_pool(repos.clone(), workers, |repo| {
        let labeler = Arc::clone(&labeler);
        async move { labeler.repository_domain(&repo).await }
    })
    .await;

    repos
        .into_iter()
        .zip(results)
        .map(|(mut repo, result)| {
            let domain = flatten(result).unwrap_or_else(|e| {
                tracing::warn!("{}: domain labeling failed: {}", repo.full_name, e);
                FALLBACK_LABEL.to_string()
            });
            repo.domain = Some(domain);
            repo
        })
        .collect()
}
