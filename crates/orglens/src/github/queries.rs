//! GraphQL documents.
//!
//! Every paginated query takes `$cursor` and asks for `rateLimit` so the
//! client can see budget exhaustion on the same response.

/// Connection path of [`ORG_REPOSITORIES`].
pub const ORG_REPOSITORIES_PATH: &[&str] = &["organization", "repositories"];

pub const ORG_REPOSITORIES: &str = r#"
query ($org: String!, $cursor: String) {
  organization(login: $org) {
    repositories(first: 100, after: $cursor, orderBy: {field: UPDATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        nameWithOwner
        isPrivate
        description
        isFork
        createdAt
        updatedAt
        isArchived
        stargazerCount
        forkCount
        primaryLanguage { name }
        repositoryTopics(first: 20) { nodes { topic { name } } }
        watchers { totalCount }
      }
    }
  }
  rateLimit { remaining resetAt }
}
"#;

const ISSUE_FIELDS: &str = r#"
fragment IssueFields on Issue {
  number
  title
  body
  state
  author { login }
  timelineItems(last: 1, itemTypes: [CLOSED_EVENT]) {
    nodes { ... on ClosedEvent { actor { login } } }
  }
  createdAt
  updatedAt
  closedAt
  labels(first: 10) { nodes { name } }
}
"#;

const PULL_REQUEST_FIELDS: &str = r#"
fragment PullRequestFields on PullRequest {
  number
  title
  body
  state
  merged
  author { login }
  mergedBy { login }
  createdAt
  updatedAt
  closedAt
  additions
  deletions
  changedFiles
}
"#;

/// Connection path of [`search_items`].
pub const SEARCH_PATH: &[&str] = &["search"];

/// Combined issue / pull request search; `$queryString` carries the
/// `repo:` and `updated:` qualifiers.
pub fn search_items() -> String {
    format!(
        r#"
query ($queryString: String!, $cursor: String) {{
  search(query: $queryString, type: ISSUE, first: 100, after: $cursor) {{
    pageInfo {{ hasNextPage endCursor }}
    nodes {{
      __typename
      ...IssueFields
      ...PullRequestFields
    }}
  }}
  rateLimit {{ remaining resetAt }}
}}
{ISSUE_FIELDS}
{PULL_REQUEST_FIELDS}
"#
    )
}

/// Connection path of [`repository_issues`].
pub const REPOSITORY_ISSUES_PATH: &[&str] = &["repository", "issues"];

/// Every issue of a repository, oldest first.
pub fn repository_issues() -> String {
    format!(
        r#"
query ($owner: String!, $name: String!, $cursor: String) {{
  repository(owner: $owner, name: $name) {{
    issues(first: 100, after: $cursor, orderBy: {{field: CREATED_AT, direction: ASC}}) {{
      pageInfo {{ hasNextPage endCursor }}
      nodes {{ ...IssueFields }}
    }}
  }}
  rateLimit {{ remaining resetAt }}
}}
{ISSUE_FIELDS}
"#
    )
}

/// Connection path of [`repository_pull_requests`].
pub const REPOSITORY_PULL_REQUESTS_PATH: &[&str] = &["repository", "pullRequests"];

/// Every pull request of a repository, oldest first.
pub fn repository_pull_requests() -> String {
    format!(
        r#"
query ($owner: String!, $name: String!, $cursor: String) {{
  repository(owner: $owner, name: $name) {{
    pullRequests(first: 100, after: $cursor, orderBy: {{field: CREATED_AT, direction: ASC}}) {{
      pageInfo {{ hasNextPage endCursor }}
      nodes {{ ...PullRequestFields }}
    }}
  }}
  rateLimit {{ remaining resetAt }}
}}
{PULL_REQUEST_FIELDS}
"#
    )
}

pub const ISSUE_COMMENTS_PATH: &[&str] = &["repository", "issue", "comments"];

pub const ISSUE_COMMENTS: &str = r#"
query ($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      comments(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes { author { login } createdAt }
      }
    }
  }
  rateLimit { remaining resetAt }
}
"#;

pub const PULL_REQUEST_COMMENTS_PATH: &[&str] = &["repository", "pullRequest", "comments"];

pub const PULL_REQUEST_COMMENTS: &str = r#"
query ($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      comments(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes { author { login } createdAt }
      }
    }
  }
  rateLimit { remaining resetAt }
}
"#;

pub const PULL_REQUEST_REVIEW_THREADS_PATH: &[&str] =
    &["repository", "pullRequest", "reviewThreads"];

pub const PULL_REQUEST_REVIEW_THREADS: &str = r#"
query ($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviewThreads(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          comments(first: 50) { nodes { author { login } createdAt } }
        }
      }
    }
  }
  rateLimit { remaining resetAt }
}
"#;

pub const PULL_REQUEST_COMMITS_PATH: &[&str] = &["repository", "pullRequest", "commits"];

pub const PULL_REQUEST_COMMITS: &str = r#"
query ($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      commits(first: 50, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes { commit { oid } }
      }
    }
  }
  rateLimit { remaining resetAt }
}
"#;

pub const PULL_REQUEST_FILES_PATH: &[&str] = &["repository", "pullRequest", "files"];

pub const PULL_REQUEST_FILES: &str = r#"
query ($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      files(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        edges { node { path additions deletions changeType } }
      }
    }
  }
  rateLimit { remaining resetAt }
}
"#;

pub const COMMIT_HISTORY_PATH: &[&str] = &["repository", "defaultBranchRef", "target", "history"];

/// Default-branch history within `[$since, $until]` (ISO-8601 timestamps).
pub const COMMIT_HISTORY: &str = r#"
query ($owner: String!, $name: String!, $since: GitTimestamp!, $until: GitTimestamp!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(first: 100, after: $cursor, since: $since, until: $until) {
            pageInfo { hasNextPage endCursor }
            nodes {
              oid
              message
              committedDate
              author { name email }
            }
          }
        }
      }
    }
  }
  rateLimit { remaining resetAt }
}
"#;
