//! Model conversion from GitHub API nodes to domain records.

use chrono::{DateTime, Utc};

use super::types::{
    ActivityNode, CommitHistoryNode, FileNode, IssueNode, PullRequestNode, RepositoryNode,
    RestCommitFile, ReviewThreadNode, SearchNode,
};
use crate::model::{
    Activity, CommitRecord, FileChange, IssueRecord, PullRequestRecord, RepositoryRecord,
    TrackedItem,
};

/// Convert an organization repository node.
///
/// Returns `None` for private repositories and for repositories created
/// after `cutoff`.
pub fn to_repository_record(
    node: RepositoryNode,
    cutoff: Option<DateTime<Utc>>,
) -> Option<RepositoryRecord> {
    if node.is_private {
        return None;
    }
    if let Some(cutoff) = cutoff
        && node.created_at > cutoff
    {
        return None;
    }

    Some(RepositoryRecord {
        full_name: node.name_with_owner,
        private: node.is_private,
        description: node.description,
        fork: node.is_fork,
        created_at: node.created_at,
        updated_at: node.updated_at,
        archived: node.is_archived,
        stargazers_count: node.stargazer_count,
        forks_count: node.fork_count,
        language: node.primary_language.map(|l| l.name),
        topics: node
            .repository_topics
            .iter()
            .map(|t| t.topic.name.clone())
            .collect(),
        watchers_count: node.watchers.map(|w| w.total_count).unwrap_or(0),
        domain: None,
    })
}

pub fn to_issue_record(repo: &str, node: IssueNode) -> IssueRecord {
    // Only the last close event is requested; reopen/close cycles keep the latest.
    let closed_by = node
        .timeline_items
        .iter()
        .filter_map(|event| event.actor.as_ref())
        .last()
        .map(|actor| actor.login.clone());

    IssueRecord {
        repo: repo.to_string(),
        number: node.number,
        title: node.title,
        body: node.body,
        state: node.state,
        user: node.author.map(|a| a.login),
        closed_by,
        created_at: node.created_at,
        updated_at: node.updated_at,
        closed_at: node.closed_at,
        labels: node.labels.iter().map(|l| l.name.clone()).collect(),
        category: None,
        comment_by: None,
        error: None,
    }
}

pub fn to_pull_request_record(repo: &str, node: PullRequestNode) -> PullRequestRecord {
    PullRequestRecord {
        repo: repo.to_string(),
        number: node.number,
        title: node.title,
        body: node.body,
        state: node.state,
        user: node.author.map(|a| a.login),
        created_at: node.created_at,
        updated_at: node.updated_at,
        closed_at: node.closed_at,
        merged: node.merged,
        merged_by: node.merged_by.map(|m| m.login),
        additions: node.additions,
        deletions: node.deletions,
        changed_files: node.changed_files,
        category: None,
        commits: None,
        files: None,
        comment_by: None,
        review_by: None,
        error: None,
    }
}

/// Convert a search node; node kinds other than issues and pull requests
/// are dropped.
pub fn to_tracked_item(repo: &str, node: SearchNode) -> Option<TrackedItem> {
    match node {
        SearchNode::Issue(issue) => Some(TrackedItem::Issue(to_issue_record(repo, issue))),
        SearchNode::PullRequest(pr) => {
            Some(TrackedItem::PullRequest(to_pull_request_record(repo, pr)))
        }
        SearchNode::Other => None,
    }
}

pub fn to_activity(node: ActivityNode) -> Activity {
    Activity {
        author: node.author.map(|a| a.login),
        at: node.created_at,
    }
}

/// Flatten a review thread into its comments.
pub fn review_thread_activity(thread: ReviewThreadNode) -> Vec<Activity> {
    thread
        .comments
        .nodes
        .into_iter()
        .flatten()
        .map(to_activity)
        .collect()
}

pub fn to_file_change(node: FileNode) -> FileChange {
    FileChange {
        filename: node.path,
        status: node.change_type.to_lowercase(),
        additions: node.additions,
        deletions: node.deletions,
        changes: node.additions + node.deletions,
    }
}

pub fn rest_file_change(file: RestCommitFile) -> FileChange {
    FileChange {
        filename: file.filename,
        status: file.status.to_lowercase(),
        additions: file.additions,
        deletions: file.deletions,
        changes: file.changes,
    }
}

pub fn to_commit_record(node: CommitHistoryNode) -> CommitRecord {
    let author = node.author.unwrap_or_default();
    CommitRecord {
        sha: node.oid,
        author_name: author.name,
        author_email: author.email,
        message: node.message,
        committed_at: node.committed_date,
        files: None,
        why_what_label: None,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo_node(private: bool, created_at: &str) -> RepositoryNode {
        serde_json::from_value(json!({
            "nameWithOwner": "PaddlePaddle/Paddle",
            "isPrivate": private,
            "description": "PArallel Distributed Deep LEarning",
            "isFork": false,
            "createdAt": created_at,
            "updatedAt": "2024-06-01T00:00:00Z",
            "isArchived": false,
            "stargazerCount": 22000,
            "forkCount": 5000,
            "primaryLanguage": { "name": "C++" },
            "repositoryTopics": { "nodes": [{ "topic": { "name": "deep-learning" } }] },
            "watchers": { "totalCount": 700 }
        }))
        .unwrap()
    }

    #[test]
    fn test_repository_conversion() {
        let record = to_repository_record(repo_node(false, "2016-08-15T06:59:08Z"), None).unwrap();
        assert_eq!(record.full_name, "PaddlePaddle/Paddle");
        assert_eq!(record.language.as_deref(), Some("C++"));
        assert_eq!(record.topics, vec!["deep-learning"]);
        assert_eq!(record.watchers_count, 700);
        assert!(record.domain.is_none());
    }

    #[test]
    fn test_private_repositories_are_skipped() {
        assert!(to_repository_record(repo_node(true, "2016-08-15T06:59:08Z"), None).is_none());
    }

    #[test]
    fn test_repositories_created_after_cutoff_are_skipped() {
        let cutoff: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        assert!(to_repository_record(repo_node(false, "2024-01-02T00:00:00Z"), Some(cutoff)).is_none());
        assert!(to_repository_record(repo_node(false, "2023-12-31T00:00:00Z"), Some(cutoff)).is_some());
    }

    #[test]
    fn test_issue_closing_actor_and_labels() {
        let node: IssueNode = serde_json::from_value(json!({
            "number": 12,
            "title": "segfault",
            "body": "trace",
            "state": "CLOSED",
            "author": { "login": "alice" },
            "timelineItems": { "nodes": [{ "actor": { "login": "maintainer" } }] },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-03T00:00:00Z",
            "closedAt": "2024-01-03T00:00:00Z",
            "labels": { "nodes": [{ "name": "bug" }, { "name": "gpu" }] }
        }))
        .unwrap();

        let issue = to_issue_record("PaddlePaddle/Paddle", node);
        assert_eq!(issue.repo, "PaddlePaddle/Paddle");
        assert_eq!(issue.closed_by.as_deref(), Some("maintainer"));
        assert_eq!(issue.user.as_deref(), Some("alice"));
        assert_eq!(issue.labels, vec!["bug", "gpu"]);
        assert!(issue.comment_by.is_none());
    }

    #[test]
    fn test_tracked_item_from_search_node() {
        let node: SearchNode = serde_json::from_value(json!({
            "__typename": "PullRequest",
            "number": 7,
            "title": "fix",
            "body": null,
            "state": "MERGED",
            "merged": true,
            "author": { "login": "bob" },
            "mergedBy": { "login": "carol" },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "closedAt": "2024-01-02T00:00:00Z",
            "additions": 10,
            "deletions": 2,
            "changedFiles": 3
        }))
        .unwrap();

        match to_tracked_item("o/r", node) {
            Some(TrackedItem::PullRequest(pr)) => {
                assert!(pr.merged);
                assert_eq!(pr.merged_by.as_deref(), Some("carol"));
                assert_eq!(pr.changed_files, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }

        assert!(to_tracked_item("o/r", SearchNode::Other).is_none());
    }

    #[test]
    fn test_file_change_lowercases_status_and_sums_changes() {
        let change = to_file_change(FileNode {
            path: "python/paddle/nn/layer.py".to_string(),
            additions: 4,
            deletions: 1,
            change_type: "MODIFIED".to_string(),
        });
        assert_eq!(change.status, "modified");
        assert_eq!(change.changes, 5);
    }

    #[test]
    fn test_review_threads_flatten_to_activity() {
        let thread: ReviewThreadNode = serde_json::from_value(json!({
            "comments": { "nodes": [
                { "author": { "login": "a" }, "createdAt": "2024-01-01T00:00:00Z" },
                { "author": null, "createdAt": "2024-01-02T00:00:00Z" }
            ] }
        }))
        .unwrap();
        let activity = review_thread_activity(thread);
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].author.as_deref(), Some("a"));
        assert!(activity[1].author.is_none());
    }

    #[test]
    fn test_commit_without_author() {
        let record = to_commit_record(CommitHistoryNode {
            oid: "abc".to_string(),
            message: "init".to_string(),
            committed_date: None,
            author: None,
        });
        assert_eq!(record.sha, "abc");
        assert!(record.author_name.is_none());
        assert!(record.author_email.is_none());
    }
}
