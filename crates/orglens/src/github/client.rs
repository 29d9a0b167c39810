//! GitHub API client and transport policy.
//!
//! Every request goes through [`GitHubClient::execute`], which applies the
//! retry policy in layers:
//!
//! 1. Wait on the shared [`RateLimitGate`].
//! 2. Send; 502/503/504 are retried with exponential backoff.
//! 3. Rate-limit exhaustion closes the gate and the same request is sent
//!    again once it opens. The exhausted response's data is discarded.
//! 4. Network failures and malformed bodies pause for a fixed interval and
//!    retry, optionally bounded by [`TransportPolicy::network_retries`].
//! 5. Anything else (GraphQL `errors`, other statuses) is returned as is.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{GitHubError, short_error_message};
use super::rate_limit::{RateLimitGate, RateLimitState};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::retry::{RetryConfig, with_retry};
use crate::sync::{NETWORK_RETRY_DELAY_MS, ProgressCallback, SyncProgress, emit};

/// Default GraphQL endpoint.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Default REST endpoint root.
pub const DEFAULT_REST_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "orglens";

/// Fallback wait when GitHub reports a rate limit without a reset time.
const UNKNOWN_RESET_WAIT_SECS: i64 = 60;

/// Retry behavior of the client.
#[derive(Debug, Clone)]
pub struct TransportPolicy {
    /// Backoff for 502/503/504.
    pub server_retry: RetryConfig,
    /// Fixed pause after a network failure or malformed body.
    pub network_retry_delay: StdDuration,
    /// Maximum consecutive network-level retries; `None` retries forever.
    pub network_retries: Option<u32>,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            server_retry: RetryConfig::default(),
            network_retry_delay: StdDuration::from_millis(NETWORK_RETRY_DELAY_MS),
            network_retries: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorItem>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorItem {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitField {
    remaining: u64,
    reset_at: DateTime<Utc>,
}

/// GitHub API client.
///
/// Cheap to clone; clones share the transport and the rate-limit gate.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    token: String,
    graphql_url: String,
    rest_url: String,
    gate: RateLimitGate,
    policy: TransportPolicy,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl GitHubClient {
    /// Create a new client talking to the public GitHub API.
    pub fn new(token: &str) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::new(StdDuration::from_secs(60), USER_AGENT)?;
        Ok(Self::new_with_transport(token, Arc::new(transport)))
    }

    pub fn new_with_transport(token: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            token: token.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
            gate: RateLimitGate::new(),
            policy: TransportPolicy::default(),
            on_progress: None,
        }
    }

    /// Override the API endpoints (GitHub Enterprise, proxies).
    #[must_use]
    pub fn with_endpoints(mut self, graphql_url: &str, rest_url: &str) -> Self {
        self.graphql_url = graphql_url.to_string();
        self.rest_url = rest_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: TransportPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: RateLimitGate) -> Self {
        self.gate = gate;
        self
    }

    /// Report retries and rate-limit waits through `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// The shared rate-limit gate.
    pub fn gate(&self) -> &RateLimitGate {
        &self.gate
    }

    fn progress(&self) -> Option<&ProgressCallback> {
        self.on_progress.as_deref()
    }

    fn authorize(&self, request: HttpRequest, accept: &str) -> HttpRequest {
        request
            .with_header("Accept", accept)
            .with_header("User-Agent", USER_AGENT)
            .with_bearer_token(&self.token)
    }

    /// Run a GraphQL query and return its `data` object.
    pub async fn graphql(&self, query: &str, variables: &Value) -> Result<Value, GitHubError> {
        let body = serde_json::to_vec(&serde_json::json!({
            "query": query,
            "variables": variables,
        }))?;

        self.execute("graphql", || self.graphql_once(&body)).await
    }

    /// Make an authenticated REST GET request against `path`.
    pub async fn rest_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GitHubError> {
        let url = format!("{}{}", self.rest_url, path);
        let value = self.execute(path, || self.rest_once(&url)).await?;
        serde_json::from_value(value).map_err(|e| GitHubError::decode(e.to_string()))
    }

    async fn execute<T, F, Fut>(&self, label: &str, mut attempt: F) -> Result<T, GitHubError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GitHubError>>,
    {
        let mut network_failures = 0u32;

        loop {
            self.gate.wait(self.progress()).await;

            let result = with_retry(
                &mut attempt,
                self.policy.server_retry.clone(),
                GitHubError::is_server_error,
                |e: &GitHubError| short_error_message(e),
                label,
                self.progress(),
            )
            .await;

            match result {
                Ok(value) => return Ok(value),
                Err(GitHubError::RateLimited { reset_at }) => {
                    self.gate.block_until(reset_at);
                }
                Err(e) if e.is_transient() => {
                    network_failures += 1;
                    if let Some(max) = self.policy.network_retries
                        && network_failures > max
                    {
                        return Err(e);
                    }

                    let message = short_error_message(&e);
                    tracing::warn!(
                        "{} failed ({}), retrying in {:?}",
                        label,
                        message,
                        self.policy.network_retry_delay
                    );
                    emit(
                        self.progress(),
                        SyncProgress::NetworkRetry {
                            operation: label.to_string(),
                            attempt: network_failures,
                            error: message,
                        },
                    );
                    tokio::time::sleep(self.policy.network_retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn graphql_once(&self, body: &[u8]) -> Result<Value, GitHubError> {
        let request = self.authorize(
            HttpRequest::post_json(self.graphql_url.as_str(), body.to_vec()),
            "application/json",
        );

        let response = self.transport.send(request).await?;
        check_status(&response)?;

        let envelope: GraphQlEnvelope = serde_json::from_slice(&response.body)?;

        // Exhausted budget: the data of this response is dropped and the
        // same request is repeated after the reset.
        if let Some(rate) = envelope
            .data
            .as_ref()
            .and_then(|d| d.get("rateLimit"))
            .and_then(|r| serde_json::from_value::<RateLimitField>(r.clone()).ok())
            && rate.remaining == 0
        {
            return Err(GitHubError::RateLimited {
                reset_at: rate.reset_at,
            });
        }

        if let Some(errors) = envelope.errors
            && !errors.is_empty()
        {
            if errors.iter().any(|e| e.kind.as_deref() == Some("RATE_LIMITED")) {
                return Err(GitHubError::RateLimited {
                    reset_at: reset_from_headers(&response),
                });
            }
            return Err(GitHubError::GraphQl {
                messages: errors.into_iter().map(|e| e.message).collect(),
            });
        }

        envelope
            .data
            .ok_or_else(|| GitHubError::decode("response carried neither data nor errors"))
    }

    async fn rest_once(&self, url: &str) -> Result<Value, GitHubError> {
        let request = self.authorize(HttpRequest::get(url), "application/vnd.github+json");

        let response = self.transport.send(request).await?;

        // A successful response that used the last call still counts; the
        // next request waits.
        if response.is_success()
            && let Some(state) = RateLimitState::from_headers(&response.headers)
        {
            self.gate.observe(&state);
        }

        check_status(&response)?;
        Ok(serde_json::from_slice(&response.body)?)
    }
}

/// Map a non-success status to an error; 403/429 with an exhausted budget
/// become [`GitHubError::RateLimited`].
fn check_status(response: &HttpResponse) -> Result<(), GitHubError> {
    if response.is_success() {
        return Ok(());
    }

    if matches!(response.status, 403 | 429) {
        let exhausted = response.header("x-ratelimit-remaining") == Some("0");
        let retry_after = response.header_i64("retry-after");

        if let Some(secs) = retry_after {
            return Err(GitHubError::RateLimited {
                reset_at: Utc::now() + chrono::Duration::seconds(secs),
            });
        }
        if exhausted {
            return Err(GitHubError::RateLimited {
                reset_at: reset_from_headers(response),
            });
        }
    }

    let message = String::from_utf8_lossy(&response.body).to_string();
    Err(GitHubError::Status {
        status: response.status,
        message,
    })
}

fn reset_from_headers(response: &HttpResponse) -> DateTime<Utc> {
    response
        .header_i64("x-ratelimit-reset")
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
        .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(UNKNOWN_RESET_WAIT_SECS))
}
