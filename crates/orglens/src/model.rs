//! Domain records persisted in the collection store.
//!
//! Field names follow the on-disk JSON layout so that existing collections
//! load without migration. Optional detail fields are skipped when absent,
//! which is how "not enriched" is told apart from "enriched and empty".

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment authors that never count as a human first response.
pub const COMMENT_BOTS: &[&str] = &["paddle-bot", "CLAassistant"];

/// Review authors that never count as a human first response.
pub const REVIEW_BOTS: &[&str] = &["paddle-bot"];

/// Kind of tracked item, decided once from the node's `__typename`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Issue,
    PullRequest,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Issue => write!(f, "issue"),
            ItemKind::PullRequest => write!(f, "pull request"),
        }
    }
}

/// One authored event (comment or review comment): who and when.
///
/// Stored as a two-element `[author, time]` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Option<String>, DateTime<Utc>)", into = "(Option<String>, DateTime<Utc>)")]
pub struct Activity {
    /// Login of the author; `None` for deleted accounts.
    pub author: Option<String>,
    pub at: DateTime<Utc>,
}

impl From<(Option<String>, DateTime<Utc>)> for Activity {
    fn from((author, at): (Option<String>, DateTime<Utc>)) -> Self {
        Self { author, at }
    }
}

impl From<Activity> for (Option<String>, DateTime<Utc>) {
    fn from(activity: Activity) -> Self {
        (activity.author, activity.at)
    }
}

/// Per-file change summary of a pull request or commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    /// Lower-cased change type (`added`, `modified`, `removed`, `renamed`, ...).
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

/// A repository of one of the mirrored organizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// `owner/name`; unique key.
    pub full_name: String,
    pub private: bool,
    pub description: Option<String>,
    pub fork: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived: bool,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub watchers_count: u64,
    /// Assigned once by the labeler and carried forward on later passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// An issue of a mirrored repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Repository full name.
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub user: Option<String>,
    /// Actor of the last close event.
    pub closed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_by: Option<Vec<Activity>>,
    /// Set when detail enrichment failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A pull request of a mirrored repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    /// Repository full name.
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub user: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged: bool,
    pub merged_by: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Commit SHAs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileChange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_by: Option<Vec<Activity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_by: Option<Vec<Activity>>,
    /// Set when detail enrichment failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PullRequestRecord {
    /// Time of the first human response.
    ///
    /// Starts at `closed_at`, is replaced by the first comment from a
    /// non-bot author, and is then replaced again by the first review
    /// comment from a non-bot author if one exists, even when that review
    /// is later than the comment.
    #[must_use]
    pub fn first_response_at(&self) -> Option<DateTime<Utc>> {
        let mut first = self.closed_at;

        if let Some(at) = first_human(self.comment_by.as_deref(), COMMENT_BOTS) {
            first = Some(at);
        }
        if let Some(at) = first_human(self.review_by.as_deref(), REVIEW_BOTS) {
            first = Some(at);
        }

        first
    }
}

fn first_human(activity: Option<&[Activity]>, bots: &[&str]) -> Option<DateTime<Utc>> {
    activity?
        .iter()
        .find(|a| a.author.as_deref().is_none_or(|login| !bots.contains(&login)))
        .map(|a| a.at)
}

/// An issue or pull request, as returned by the combined search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedItem {
    Issue(IssueRecord),
    PullRequest(PullRequestRecord),
}

impl TrackedItem {
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            TrackedItem::Issue(_) => ItemKind::Issue,
            TrackedItem::PullRequest(_) => ItemKind::PullRequest,
        }
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        match self {
            TrackedItem::Issue(issue) => issue.number,
            TrackedItem::PullRequest(pr) => pr.number,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            TrackedItem::Issue(issue) => issue.error.as_deref(),
            TrackedItem::PullRequest(pr) => pr.error.as_deref(),
        }
    }

    /// Split a mixed batch into issues and pull requests, keeping order.
    #[must_use]
    pub fn partition(items: Vec<TrackedItem>) -> (Vec<IssueRecord>, Vec<PullRequestRecord>) {
        let mut issues = Vec::new();
        let mut prs = Vec::new();
        for item in items {
            match item {
                TrackedItem::Issue(issue) => issues.push(issue),
                TrackedItem::PullRequest(pr) => prs.push(pr),
            }
        }
        (issues, prs)
    }
}

/// A commit on a repository's default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Unique key.
    pub sha: String,
    #[serde(rename = "author")]
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub message: String,
    pub committed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileChange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_what_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    pub fn repository(full_name: &str) -> RepositoryRecord {
        RepositoryRecord {
            full_name: full_name.to_string(),
            private: false,
            description: None,
            fork: false,
            created_at: ts(1, 0),
            updated_at: ts(2, 0),
            archived: false,
            stargazers_count: 0,
            forks_count: 0,
            language: Some("Python".to_string()),
            topics: Vec::new(),
            watchers_count: 0,
            domain: None,
        }
    }

    pub fn issue(number: u64) -> IssueRecord {
        IssueRecord {
            repo: "PaddlePaddle/Paddle".to_string(),
            number,
            title: format!("issue {number}"),
            body: None,
            state: "OPEN".to_string(),
            user: Some("alice".to_string()),
            closed_by: None,
            created_at: ts(1, 0),
            updated_at: ts(2, 0),
            closed_at: None,
            labels: Vec::new(),
            category: None,
            comment_by: None,
            error: None,
        }
    }

    pub fn pull_request(number: u64) -> PullRequestRecord {
        PullRequestRecord {
            repo: "PaddlePaddle/Paddle".to_string(),
            number,
            title: format!("pr {number}"),
            body: Some("body".to_string()),
            state: "OPEN".to_string(),
            user: Some("bob".to_string()),
            created_at: ts(1, 0),
            updated_at: ts(2, 0),
            closed_at: None,
            merged: false,
            merged_by: None,
            additions: 1,
            deletions: 0,
            changed_files: 1,
            category: None,
            commits: None,
            files: None,
            comment_by: None,
            review_by: None,
            error: None,
        }
    }

    pub fn commit(sha: &str, name: &str, email: &str) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            author_name: Some(name.to_string()),
            author_email: Some(email.to_string()),
            message: format!("commit {sha}"),
            committed_at: Some(ts(1, 0)),
            files: None,
            why_what_label: None,
            error: None,
        }
    }
}
