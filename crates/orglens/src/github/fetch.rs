//! Resource fetchers: repositories, issues, pull requests, their
//! sub-resources, and default-branch commits.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::client::GitHubClient;
use super::convert::{
    rest_file_change, review_thread_activity, to_activity, to_commit_record, to_file_change,
    to_issue_record, to_pull_request_record, to_repository_record, to_tracked_item,
};
use super::error::GitHubError;
use super::pagination::{NodeResult, Paginated, PaginatedQuery, StreamSummary};
use super::queries;
use super::types::{
    ActivityNode, CommitHistoryNode, FileNode, IssueNode, PullRequestCommitNode, PullRequestNode,
    RepositoryNode, RestCommit, ReviewThreadNode, SearchNode,
};
use crate::model::{Activity, CommitRecord, FileChange, RepositoryRecord, TrackedItem};
use crate::sync::ProgressCallback;

/// Split `owner/name`.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str), GitHubError> {
    match full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
        _ => Err(GitHubError::decode(format!(
            "invalid repository name: {full_name}"
        ))),
    }
}

/// Build the combined search qualifier string.
pub fn search_query_string(repo: &str, since: NaiveDate, until: NaiveDate) -> String {
    format!(
        "repo:{} updated:{}..{}",
        repo,
        since.format("%Y-%m-%d"),
        until.format("%Y-%m-%d")
    )
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    date.and_time(last_second).and_utc()
}

impl GitHubClient {
    /// List an organization's public repositories, most recently updated first.
    ///
    /// Repositories created after the start of `until` are skipped.
    #[tracing::instrument(skip(self, on_progress))]
    pub async fn list_org_repos(
        &self,
        org: &str,
        until: Option<NaiveDate>,
        on_progress: Option<&ProgressCallback>,
    ) -> Paginated<RepositoryRecord> {
        let cutoff = until.map(start_of_day);
        let query = PaginatedQuery::new(
            format!("repos {org}"),
            queries::ORG_REPOSITORIES,
            json!({ "org": org }),
            queries::ORG_REPOSITORIES_PATH,
            move |node| {
                serde_json::from_value::<RepositoryNode>(node)
                    .map(|n| to_repository_record(n, cutoff))
            },
        );
        self.fetch_all(&query, on_progress).await
    }

    /// Every issue and pull request of `repo`, without a time bound.
    ///
    /// Issues come first, then pull requests. A failure in either
    /// connection is recorded on the result; whatever was fetched is kept.
    #[tracing::instrument(skip(self, on_progress))]
    pub async fn fetch_all_items(
        &self,
        repo: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Paginated<TrackedItem>, GitHubError> {
        let (owner, name) = split_full_name(repo)?;
        let variables = json!({ "owner": owner, "name": name });

        let issues_document = queries::repository_issues();
        let issues_query = PaginatedQuery::new(
            format!("issues {repo}"),
            &issues_document,
            variables.clone(),
            queries::REPOSITORY_ISSUES_PATH,
            |node| {
                serde_json::from_value::<IssueNode>(node)
                    .map(|n| Some(TrackedItem::Issue(to_issue_record(repo, n))))
            },
        );
        let issues = self.fetch_all(&issues_query, on_progress).await;

        let prs_document = queries::repository_pull_requests();
        let prs_query = PaginatedQuery::new(
            format!("prs {repo}"),
            &prs_document,
            variables,
            queries::REPOSITORY_PULL_REQUESTS_PATH,
            |node| {
                serde_json::from_value::<PullRequestNode>(node)
                    .map(|n| Some(TrackedItem::PullRequest(to_pull_request_record(repo, n))))
            },
        );
        let prs = self.fetch_all(&prs_query, on_progress).await;

        let mut items = issues.items;
        items.extend(prs.items);
        Ok(Paginated {
            items,
            pages: issues.pages + prs.pages,
            malformed: issues.malformed + prs.malformed,
            error: issues.error.or(prs.error),
        })
    }

    fn search_query<'a>(
        document: &'a str,
        repo: &'a str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> PaginatedQuery<'a, TrackedItem> {
        PaginatedQuery::new(
            format!("search {repo}"),
            document,
            json!({ "queryString": search_query_string(repo, since, until) }),
            queries::SEARCH_PATH,
            move |node| {
                serde_json::from_value::<SearchNode>(node).map(|n| to_tracked_item(repo, n))
            },
        )
    }

    /// Issues and pull requests of `repo` updated within `[since, until]`.
    #[tracing::instrument(skip(self, on_progress))]
    pub async fn search_items(
        &self,
        repo: &str,
        since: NaiveDate,
        until: NaiveDate,
        on_progress: Option<&ProgressCallback>,
    ) -> Paginated<TrackedItem> {
        let document = queries::search_items();
        let query = Self::search_query(&document, repo, since, until);
        self.fetch_all(&query, on_progress).await
    }

    /// Streaming variant of [`search_items`](Self::search_items).
    pub async fn search_items_streaming(
        &self,
        repo: &str,
        since: NaiveDate,
        until: NaiveDate,
        tx: mpsc::Sender<TrackedItem>,
        on_progress: Option<&ProgressCallback>,
    ) -> StreamSummary {
        let document = queries::search_items();
        let query = Self::search_query(&document, repo, since, until);
        self.fetch_streaming(&query, tx, on_progress).await
    }

    /// Fetch one per-item sub-resource; a partial result is an error.
    async fn item_connection<T>(
        &self,
        repo: &str,
        number: u64,
        document: &str,
        path: &[&str],
        map: impl Fn(Value) -> NodeResult<T> + Send + Sync + 'static,
    ) -> Result<Vec<T>, GitHubError> {
        let (owner, name) = split_full_name(repo)?;
        let query = PaginatedQuery::new(
            format!("{} {repo}#{number}", path.last().copied().unwrap_or("connection")),
            document,
            json!({ "owner": owner, "name": name, "number": number }),
            path,
            map,
        );
        self.fetch_all(&query, None).await.into_result()
    }

    pub async fn issue_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Activity>, GitHubError> {
        self.item_connection(
            repo,
            number,
            queries::ISSUE_COMMENTS,
            queries::ISSUE_COMMENTS_PATH,
            |node| serde_json::from_value::<ActivityNode>(node).map(|n| Some(to_activity(n))),
        )
        .await
    }

    pub async fn pull_request_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Activity>, GitHubError> {
        self.item_connection(
            repo,
            number,
            queries::PULL_REQUEST_COMMENTS,
            queries::PULL_REQUEST_COMMENTS_PATH,
            |node| serde_json::from_value::<ActivityNode>(node).map(|n| Some(to_activity(n))),
        )
        .await
    }

    /// Review-thread comments of a pull request, flattened in thread order.
    pub async fn pull_request_reviews(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Activity>, GitHubError> {
        let threads = self
            .item_connection(
                repo,
                number,
                queries::PULL_REQUEST_REVIEW_THREADS,
                queries::PULL_REQUEST_REVIEW_THREADS_PATH,
                |node| {
                    serde_json::from_value::<ReviewThreadNode>(node)
                        .map(|n| Some(review_thread_activity(n)))
                },
            )
            .await?;
        Ok(threads.into_iter().flatten().collect())
    }

    /// Commit SHAs of a pull request.
    pub async fn pull_request_commits(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<String>, GitHubError> {
        self.item_connection(
            repo,
            number,
            queries::PULL_REQUEST_COMMITS,
            queries::PULL_REQUEST_COMMITS_PATH,
            |node| serde_json::from_value::<PullRequestCommitNode>(node).map(|n| Some(n.commit.oid)),
        )
        .await
    }

    pub async fn pull_request_files(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<FileChange>, GitHubError> {
        self.item_connection(
            repo,
            number,
            queries::PULL_REQUEST_FILES,
            queries::PULL_REQUEST_FILES_PATH,
            |node| serde_json::from_value::<FileNode>(node).map(|n| Some(to_file_change(n))),
        )
        .await
    }

    /// Default-branch commits of `repo` committed within `[since, until]`.
    #[tracing::instrument(skip(self, on_progress))]
    pub async fn commit_history(
        &self,
        repo: &str,
        since: NaiveDate,
        until: NaiveDate,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Paginated<CommitRecord>, GitHubError> {
        let (owner, name) = split_full_name(repo)?;
        let query = PaginatedQuery::new(
            format!("commits {repo}"),
            queries::COMMIT_HISTORY,
            json!({
                "owner": owner,
                "name": name,
                "since": start_of_day(since).to_rfc3339(),
                "until": end_of_day(until).to_rfc3339(),
            }),
            queries::COMMIT_HISTORY_PATH,
            |node| serde_json::from_value::<CommitHistoryNode>(node).map(|n| Some(to_commit_record(n))),
        );
        Ok(self.fetch_all(&query, on_progress).await)
    }

    /// File list of one commit (REST).
    pub async fn commit_files(&self, repo: &str, sha: &str) -> Result<Vec<FileChange>, GitHubError> {
        split_full_name(repo)?;
        let commit: RestCommit = self.rest_get(&format!("/repos/{repo}/commits/{sha}")).await?;
        Ok(commit.files.into_iter().map(rest_file_change).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::DEFAULT_REST_URL;
    use crate::github::client::test_support::*;
    use crate::http::{HttpMethod, MockTransport};

    fn issue_node(number: u64) -> Value {
        json!({
            "__typename": "Issue",
            "number": number,
            "title": format!("issue {number}"),
            "body": null,
            "state": "OPEN",
            "author": { "login": "alice" },
            "timelineItems": { "nodes": [] },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "closedAt": null,
            "labels": { "nodes": [] }
        })
    }

    fn pr_node(number: u64) -> Value {
        json!({
            "__typename": "PullRequest",
            "number": number,
            "title": format!("pr {number}"),
            "body": "",
            "state": "OPEN",
            "merged": false,
            "author": { "login": "bob" },
            "mergedBy": null,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "closedAt": null,
            "additions": 1,
            "deletions": 1,
            "changedFiles": 1
        })
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("o/r").unwrap(), ("o", "r"));
        assert!(split_full_name("no-slash").is_err());
        assert!(split_full_name("/r").is_err());
    }

    #[test]
    fn test_search_query_string() {
        assert_eq!(
            search_query_string("PaddlePaddle/Paddle", date(2025, 10, 1), date(2025, 10, 8)),
            "repo:PaddlePaddle/Paddle updated:2025-10-01..2025-10-08"
        );
    }

    #[tokio::test]
    async fn test_search_items_branches_on_typename() {
        let mock = MockTransport::new();
        push_graphql(
            &mock,
            json!({
                "search": {
                    "pageInfo": { "hasNextPage": true, "endCursor": "c1" },
                    "nodes": [issue_node(1), pr_node(2), { "__typename": "Discussion" }]
                }
            }),
        );
        push_graphql(
            &mock,
            json!({
                "search": {
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                    "nodes": [pr_node(3)]
                }
            }),
        );

        let result = client(&mock)
            .search_items("o/r", date(2024, 1, 1), date(2024, 1, 7), None)
            .await;

        let kinds: Vec<_> = result.items.iter().map(|i| (i.kind(), i.number())).collect();
        assert_eq!(
            kinds,
            vec![
                (crate::model::ItemKind::Issue, 1),
                (crate::model::ItemKind::PullRequest, 2),
                (crate::model::ItemKind::PullRequest, 3),
            ]
        );

        let bodies = graphql_bodies(&mock);
        assert_eq!(
            bodies[0]["variables"]["queryString"],
            "repo:o/r updated:2024-01-01..2024-01-07"
        );
    }

    #[tokio::test]
    async fn test_list_org_repos_skips_private_and_late_repos() {
        let repo = |name: &str, private: bool, created: &str| {
            json!({
                "nameWithOwner": format!("org/{name}"),
                "isPrivate": private,
                "description": null,
                "isFork": false,
                "createdAt": created,
                "updatedAt": "2024-06-01T00:00:00Z",
                "isArchived": false,
                "stargazerCount": 1,
                "forkCount": 0,
                "primaryLanguage": null,
                "repositoryTopics": { "nodes": [] },
                "watchers": { "totalCount": 2 }
            })
        };

        let mock = MockTransport::new();
        push_graphql(
            &mock,
            json!({
                "organization": {
                    "repositories": {
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "nodes": [
                            repo("public", false, "2020-01-01T00:00:00Z"),
                            repo("secret", true, "2020-01-01T00:00:00Z"),
                            repo("future", false, "2024-03-02T08:00:00Z")
                        ]
                    }
                }
            }),
        );

        let result = client(&mock)
            .list_org_repos("org", Some(date(2024, 3, 1)), None)
            .await;
        let names: Vec<_> = result.items.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["org/public"]);
    }

    #[tokio::test]
    async fn test_fetch_all_items_reads_both_connections() {
        let mock = MockTransport::new();
        push_graphql(
            &mock,
            json!({
                "repository": { "issues": {
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                    "nodes": [issue_node(1)]
                } }
            }),
        );
        push_graphql(
            &mock,
            json!({
                "repository": { "pullRequests": {
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                    "nodes": [pr_node(2)]
                } }
            }),
        );

        let result = client(&mock).fetch_all_items("o/r", None).await.unwrap();
        assert_eq!(result.items.len(), 2);
        assert!(result.error.is_none());
        assert!(matches!(result.items[1], TrackedItem::PullRequest(_)));
    }

    #[tokio::test]
    async fn test_reviews_are_flattened_across_threads() {
        let mock = MockTransport::new();
        push_graphql(
            &mock,
            json!({
                "repository": { "pullRequest": { "reviewThreads": {
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                    "nodes": [
                        { "comments": { "nodes": [
                            { "author": { "login": "r1" }, "createdAt": "2024-01-01T00:00:00Z" }
                        ] } },
                        { "comments": { "nodes": [
                            { "author": { "login": "r2" }, "createdAt": "2024-01-02T00:00:00Z" },
                            { "author": { "login": "r3" }, "createdAt": "2024-01-03T00:00:00Z" }
                        ] } }
                    ]
                } } }
            }),
        );

        let reviews = client(&mock).pull_request_reviews("o/r", 5).await.unwrap();
        let authors: Vec<_> = reviews.iter().filter_map(|a| a.author.as_deref()).collect();
        assert_eq!(authors, vec!["r1", "r2", "r3"]);

        let bodies = graphql_bodies(&mock);
        assert_eq!(bodies[0]["variables"]["number"], 5);
    }

    #[tokio::test]
    async fn test_sub_resource_graphql_error_is_err() {
        let mock = MockTransport::new();
        mock.push_response(
            HttpMethod::Post,
            crate::github::client::DEFAULT_GRAPHQL_URL,
            response(
                200,
                vec![],
                json!({ "errors": [{ "message": "timeout" }] }).to_string(),
            ),
        );

        let err = client(&mock).issue_comments("o/r", 1).await.unwrap_err();
        assert!(matches!(err, GitHubError::GraphQl { .. }));
    }

    #[tokio::test]
    async fn test_missing_item_yields_empty_detail() {
        let mock = MockTransport::new();
        push_graphql(&mock, json!({ "repository": { "pullRequest": null } }));

        let files = client(&mock).pull_request_files("o/r", 404).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_commit_history_and_files() {
        let mock = MockTransport::new();
        push_graphql(
            &mock,
            json!({
                "repository": { "defaultBranchRef": { "target": { "history": {
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                    "nodes": [{
                        "oid": "abc",
                        "message": "fix: typo",
                        "committedDate": "2024-01-02T03:04:05Z",
                        "author": { "name": "Alice Smith", "email": "alice@example.com" }
                    }]
                } } } }
            }),
        );
        mock.push_response(
            HttpMethod::Get,
            format!("{DEFAULT_REST_URL}/repos/o/r/commits/abc"),
            response(
                200,
                vec![],
                json!({
                    "sha": "abc",
                    "files": [{ "filename": "docs/README.md", "status": "modified",
                                "additions": 1, "deletions": 1, "changes": 2 }]
                })
                .to_string(),
            ),
        );

        let client = client(&mock);
        let history = client
            .commit_history("o/r", date(2024, 1, 1), date(2024, 1, 7), None)
            .await
            .unwrap();
        assert_eq!(history.items.len(), 1);
        assert_eq!(history.items[0].author_name.as_deref(), Some("Alice Smith"));

        let bodies = graphql_bodies(&mock);
        assert_eq!(bodies[0]["variables"]["since"], "2024-01-01T00:00:00+00:00");
        assert_eq!(bodies[0]["variables"]["until"], "2024-01-07T23:59:59+00:00");

        let files = client.commit_files("o/r", "abc").await.unwrap();
        assert_eq!(files[0].filename, "docs/README.md");
        assert_eq!(files[0].changes, 2);
    }
}
