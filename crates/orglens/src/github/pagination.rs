//! Cursor-based pagination over GraphQL connections.
//!
//! A [`PaginatedQuery`] names the query, its fixed variables, the path from
//! `data` to the connection, and a mapping applied to every node. Pages are
//! fetched strictly one after another; output order is server order.

use serde_json::Value;
use tokio::sync::mpsc;

use super::client::GitHubClient;
use super::error::{GitHubError, short_error_message};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Outcome of mapping one raw node: a record, a deliberate skip (`Ok(None)`),
/// or a node whose shape did not decode.
pub type NodeResult<T> = Result<Option<T>, serde_json::Error>;

/// Maps one raw node to a record.
pub type NodeMapper<'a, T> = Box<dyn Fn(Value) -> NodeResult<T> + Send + Sync + 'a>;

/// Configuration for a paginated fetch operation.
pub struct PaginatedQuery<'a, T> {
    /// Label used for progress reporting and logs.
    pub label: String,
    /// GraphQL document; must declare a `$cursor: String` variable.
    pub query: &'a str,
    /// Variables other than `cursor`.
    pub variables: Value,
    /// Path of keys from `data` to the connection object.
    pub connection: &'a [&'a str],
    pub map: NodeMapper<'a, T>,
}

impl<'a, T> PaginatedQuery<'a, T> {
    pub fn new(
        label: impl Into<String>,
        query: &'a str,
        variables: Value,
        connection: &'a [&'a str],
        map: impl Fn(Value) -> NodeResult<T> + Send + Sync + 'a,
    ) -> Self {
        Self {
            label: label.into(),
            query,
            variables,
            connection,
            map: Box::new(map),
        }
    }
}

/// Result of a paginated fetch.
///
/// A failed page ends the stream; the nodes gathered before it are kept and
/// the failure is recorded in `error`.
#[derive(Debug)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pages: u32,
    /// Nodes dropped because they failed to decode.
    pub malformed: usize,
    pub error: Option<GitHubError>,
}

impl<T> Paginated<T> {
    /// Turn a partial result into an error, for callers that need all or
    /// nothing.
    pub fn into_result(self) -> Result<Vec<T>, GitHubError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.items),
        }
    }
}

/// Summary of a streaming fetch.
#[derive(Debug)]
pub struct StreamSummary {
    pub sent: usize,
    pub pages: u32,
    pub malformed: usize,
    pub error: Option<GitHubError>,
}

/// One extracted page: raw nodes plus `pageInfo`.
#[derive(Debug, PartialEq)]
struct Page {
    nodes: Vec<Value>,
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Extract the connection at `path`. `None` when it is absent or null.
fn extract_page(data: &Value, path: &[&str]) -> Option<Page> {
    let mut connection = data;
    for key in path {
        connection = connection.get(key)?;
    }
    if connection.is_null() {
        return None;
    }

    let nodes = if let Some(nodes) = connection.get("nodes").and_then(Value::as_array) {
        nodes.clone()
    } else if let Some(edges) = connection.get("edges").and_then(Value::as_array) {
        edges
            .iter()
            .filter_map(|edge| edge.get("node").cloned())
            .collect()
    } else {
        Vec::new()
    };

    let page_info = connection.get("pageInfo");
    let has_next_page = page_info
        .and_then(|p| p.get("hasNextPage"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let end_cursor = page_info
        .and_then(|p| p.get("endCursor"))
        .and_then(Value::as_str)
        .map(String::from);

    Some(Page {
        nodes: nodes.into_iter().filter(|n| !n.is_null()).collect(),
        has_next_page,
        end_cursor,
    })
}

struct PageWalker<'c, 'q, 'a, T> {
    client: &'c GitHubClient,
    query: &'q PaginatedQuery<'a, T>,
    cursor: Option<String>,
    pages: u32,
    malformed: usize,
    done: bool,
}

impl<'c, 'q, 'a, T> PageWalker<'c, 'q, 'a, T> {
    fn new(client: &'c GitHubClient, query: &'q PaginatedQuery<'a, T>) -> Self {
        Self {
            client,
            query,
            cursor: None,
            pages: 0,
            malformed: 0,
            done: false,
        }
    }

    async fn next_page(&mut self) -> Option<Result<Vec<T>, GitHubError>> {
        if self.done {
            return None;
        }

        let mut variables = self.query.variables.clone();
        if let Some(vars) = variables.as_object_mut() {
            vars.insert("cursor".to_string(), Value::from(self.cursor.clone()));
        }

        let data = match self.client.graphql(self.query.query, &variables).await {
            Ok(data) => data,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let Some(page) = extract_page(&data, self.query.connection) else {
            tracing::debug!("{}: connection absent, stopping", self.query.label);
            self.done = true;
            return None;
        };
        self.pages += 1;

        match (page.has_next_page, page.end_cursor) {
            (true, Some(next)) if self.cursor.as_deref() != Some(next.as_str()) => {
                self.cursor = Some(next);
            }
            (true, _) => {
                tracing::warn!(
                    "{}: cursor did not advance after page {}, stopping",
                    self.query.label,
                    self.pages
                );
                self.done = true;
            }
            (false, _) => self.done = true,
        }

        let mut items = Vec::with_capacity(page.nodes.len());
        for node in page.nodes {
            match (self.query.map)(node) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("{}: skipping malformed node: {}", self.query.label, e);
                    self.malformed += 1;
                }
            }
        }
        Some(Ok(items))
    }
}

impl GitHubClient {
    /// Fetch every page of `query` into a vector.
    pub async fn fetch_all<T>(
        &self,
        query: &PaginatedQuery<'_, T>,
        on_progress: Option<&ProgressCallback>,
    ) -> Paginated<T> {
        let mut walker = PageWalker::new(self, query);
        let mut items = Vec::new();
        let mut error = None;

        while let Some(page) = walker.next_page().await {
            match page {
                Ok(batch) => {
                    let count = batch.len();
                    items.extend(batch);
                    emit(
                        on_progress,
                        SyncProgress::FetchedPage {
                            resource: query.label.clone(),
                            page: walker.pages,
                            count,
                            total_so_far: items.len(),
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "{}: stopping after {} items: {}",
                        query.label,
                        items.len(),
                        short_error_message(&e)
                    );
                    error = Some(e);
                }
            }
        }

        emit(
            on_progress,
            SyncProgress::FetchComplete {
                resource: query.label.clone(),
                total: items.len(),
            },
        );

        Paginated {
            items,
            pages: walker.pages,
            malformed: walker.malformed,
            error,
        }
    }

    /// Fetch every page of `query`, sending items as each page completes.
    ///
    /// Stops early if the receiver is dropped.
    pub async fn fetch_streaming<T>(
        &self,
        query: &PaginatedQuery<'_, T>,
        tx: mpsc::Sender<T>,
        on_progress: Option<&ProgressCallback>,
    ) -> StreamSummary {
        let mut walker = PageWalker::new(self, query);
        let mut sent = 0usize;
        let mut error = None;

        'pages: while let Some(page) = walker.next_page().await {
            match page {
                Ok(batch) => {
                    let count = batch.len();
                    for item in batch {
                        if tx.send(item).await.is_err() {
                            tracing::debug!("{}: receiver dropped, stopping", query.label);
                            break 'pages;
                        }
                        sent += 1;
                    }
                    emit(
                        on_progress,
                        SyncProgress::FetchedPage {
                            resource: query.label.clone(),
                            page: walker.pages,
                            count,
                            total_so_far: sent,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "{}: stopping after {} items: {}",
                        query.label,
                        sent,
                        short_error_message(&e)
                    );
                    error = Some(e);
                }
            }
        }

        emit(
            on_progress,
            SyncProgress::FetchComplete {
                resource: query.label.clone(),
                total: sent,
            },
        );

        StreamSummary {
            sent,
            pages: walker.pages,
            malformed: walker.malformed,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::test_support::*;
    use crate::github::client::DEFAULT_GRAPHQL_URL;
    use crate::http::{HttpMethod, MockTransport};
    use serde_json::json;

    const PATH: &[&str] = &["repository", "issues"];

    fn page(numbers: &[u64], has_next: bool, cursor: Option<&str>) -> Value {
        json!({
            "repository": {
                "issues": {
                    "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
                    "nodes": numbers.iter().map(|n| json!({ "number": n })).collect::<Vec<_>>()
                }
            }
        })
    }

    fn numbers_query() -> PaginatedQuery<'static, u64> {
        PaginatedQuery::new(
            "issues o/r",
            "query($cursor: String) { ... }",
            json!({ "owner": "o", "name": "r" }),
            PATH,
            |node| Ok(node.get("number").and_then(Value::as_u64)),
        )
    }

    #[test]
    fn test_extract_page_supports_edges() {
        let data = json!({
            "search": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "edges": [{ "node": { "number": 1 } }, { "node": { "number": 2 } }]
            }
        });
        let page = extract_page(&data, &["search"]).unwrap();
        assert_eq!(page.nodes.len(), 2);
        assert!(!page.has_next_page);
        assert!(page.end_cursor.is_none());
    }

    #[test]
    fn test_extract_page_null_connection_is_end() {
        let data = json!({ "repository": null });
        assert!(extract_page(&data, PATH).is_none());

        let data = json!({ "repository": { "issues": null } });
        assert!(extract_page(&data, PATH).is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_concatenates_pages_in_order() {
        let mock = MockTransport::new();
        push_graphql(&mock, page(&[1, 2], true, Some("c1")));
        push_graphql(&mock, page(&[3], true, Some("c2")));
        push_graphql(&mock, page(&[4, 5], false, Some("c3")));

        let result = client(&mock).fetch_all(&numbers_query(), None).await;

        assert_eq!(result.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(result.pages, 3);
        assert!(result.error.is_none());

        let bodies = graphql_bodies(&mock);
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[0]["variables"]["cursor"], Value::Null);
        assert_eq!(bodies[1]["variables"]["cursor"], "c1");
        assert_eq!(bodies[2]["variables"]["cursor"], "c2");
        assert_eq!(bodies[2]["variables"]["owner"], "o");
    }

    #[tokio::test]
    async fn test_mapping_can_drop_nodes() {
        let mock = MockTransport::new();
        push_graphql(&mock, page(&[1, 2, 3, 4], false, None));

        let query = PaginatedQuery::new(
            "even",
            "q",
            json!({}),
            PATH,
            |node: Value| Ok(node.get("number").and_then(Value::as_u64).filter(|n| n % 2 == 0)),
        );
        let result = client(&mock).fetch_all(&query, None).await;
        assert_eq!(result.items, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_malformed_nodes_are_counted() {
        let mock = MockTransport::new();
        push_graphql(
            &mock,
            json!({
                "repository": { "issues": {
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                    "nodes": [{ "number": 1 }, { "number": "two" }, { "number": 3 }]
                } }
            }),
        );

        let query = PaginatedQuery::new("issues o/r", "q", json!({}), PATH, |node: Value| {
            serde_json::from_value::<u64>(node["number"].clone()).map(Some)
        });
        let result = client(&mock).fetch_all(&query, None).await;
        assert_eq!(result.items, vec![1, 3]);
        assert_eq!(result.malformed, 1);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_graphql_error_keeps_partial_result() {
        let mock = MockTransport::new();
        push_graphql(&mock, page(&[1, 2], true, Some("c1")));
        mock.push_response(
            HttpMethod::Post,
            DEFAULT_GRAPHQL_URL,
            response(
                200,
                vec![],
                json!({ "errors": [{ "message": "Something went wrong" }] }).to_string(),
            ),
        );

        let result = client(&mock).fetch_all(&numbers_query(), None).await;
        assert_eq!(result.items, vec![1, 2]);
        assert!(matches!(result.error, Some(GitHubError::GraphQl { .. })));
        assert_eq!(mock.requests().len(), 2);

        let err = result.into_result().unwrap_err();
        assert!(err.to_string().contains("Something went wrong"));
    }

    #[tokio::test]
    async fn test_stalled_cursor_stops() {
        let mock = MockTransport::new();
        push_graphql(&mock, page(&[1], true, Some("same")));
        push_graphql(&mock, page(&[2], true, Some("same")));

        let result = client(&mock).fetch_all(&numbers_query(), None).await;
        assert_eq!(result.items, vec![1, 2]);
        assert_eq!(mock.requests().len(), 2);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_null_connection_ends_without_error() {
        let mock = MockTransport::new();
        push_graphql(&mock, json!({ "repository": null }));

        let result = client(&mock).fetch_all(&numbers_query(), None).await;
        assert!(result.items.is_empty());
        assert_eq!(result.pages, 0);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_streaming_delivers_items() {
        let mock = MockTransport::new();
        push_graphql(&mock, page(&[1, 2], true, Some("c1")));
        push_graphql(&mock, page(&[3], false, None));

        let (tx, mut rx) = mpsc::channel(8);
        let summary = client(&mock)
            .fetch_streaming(&numbers_query(), tx, None)
            .await;
        assert_eq!(summary.sent, 3);
        assert_eq!(summary.pages, 2);

        let mut received = Vec::new();
        while let Some(n) = rx.recv().await {
            received.push(n);
        }
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_streaming_stops_when_receiver_dropped() {
        let mock = MockTransport::new();
        push_graphql(&mock, page(&[1, 2], true, Some("c1")));
        push_graphql(&mock, page(&[3], false, None));

        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let summary = client(&mock)
            .fetch_streaming(&numbers_query(), tx, None)
            .await;
        assert_eq!(summary.sent, 0);
        assert_eq!(mock.requests().len(), 1);
    }
}
