//! GitHub API data types.
//!
//! Raw node shapes as returned by the GraphQL queries in [`super::queries`]
//! and the REST commit endpoint. Conversion to domain records lives in
//! [`super::convert`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{ login }` of an actor; absent for deleted accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub login: String,
}

/// `{ name }` of a language, label, or topic.
#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

/// A nested connection read in one page (no cursor).
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Nodes<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub nodes: Vec<Option<T>>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T> Nodes<T> {
    /// Iterate over non-null nodes.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().flatten()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicNode {
    pub topic: Named,
}

/// Repository node of `organization.repositories`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub name_with_owner: String,
    pub is_private: bool,
    pub description: Option<String>,
    pub is_fork: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_archived: bool,
    pub stargazer_count: u64,
    pub fork_count: u64,
    pub primary_language: Option<Named>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repository_topics: Nodes<TopicNode>,
    pub watchers: Option<TotalCount>,
}

/// `... on ClosedEvent { actor { login } }`; other event kinds come back as `{}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClosedEventNode {
    #[serde(default)]
    pub actor: Option<Login>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueNode {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub author: Option<Login>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeline_items: Nodes<ClosedEventNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Nodes<Named>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    pub author: Option<Login>,
    pub merged_by: Option<Login>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
}

/// A node of the combined issue/pull-request search, tagged by `__typename`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum SearchNode {
    Issue(IssueNode),
    PullRequest(PullRequestNode),
    /// Discussions and anything else the search may return.
    #[serde(other)]
    Other,
}

/// A comment or review comment: author and creation time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityNode {
    pub author: Option<Login>,
    pub created_at: DateTime<Utc>,
}

/// One review thread with its comments.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewThreadNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Nodes<ActivityNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Oid {
    pub oid: String,
}

/// Node of `pullRequest.commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestCommitNode {
    pub commit: Oid,
}

/// Node of `pullRequest.files`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
    pub change_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitActor {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Node of `defaultBranchRef.target.history`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitHistoryNode {
    pub oid: String,
    pub message: String,
    pub committed_date: Option<DateTime<Utc>>,
    pub author: Option<GitActor>,
}

/// `GET /repos/{owner}/{repo}/commits/{sha}` (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct RestCommit {
    pub sha: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<RestCommitFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestCommitFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
}
