//! GitHub API client for organization mirroring.
//!
//! # Module Structure
//!
//! - [`error`] - Error taxonomy and transient/terminal classification
//! - [`rate_limit`] - Shared sleep-until-reset gate
//! - [`client`] - Rate-limited GraphQL / REST transport
//! - [`pagination`] - Cursor-based connection walking
//! - [`queries`] - GraphQL documents
//! - [`types`] - Raw node shapes
//! - [`convert`] - Node to domain record conversion
//! - [`fetch`] - Resource fetchers built on the above
//!
//! ```ignore
//! use orglens::github::GitHubClient;
//!
//! let client = GitHubClient::new(&token)?;
//! let repos = client.list_org_repos("PaddlePaddle", None, None).await;
//! let items = client.search_items("PaddlePaddle/Paddle", since, until, None).await;
//! ```

mod client;
mod convert;
mod error;
mod fetch;
mod pagination;
pub mod queries;
mod rate_limit;
pub mod types;

pub use client::{DEFAULT_GRAPHQL_URL, DEFAULT_REST_URL, GitHubClient, TransportPolicy};
pub use error::{GitHubError, short_error_message};
pub use fetch::{search_query_string, split_full_name};
pub use pagination::{NodeMapper, NodeResult, Paginated, PaginatedQuery, StreamSummary};
pub use rate_limit::{Clock, RateLimitGate, RateLimitState};

#[cfg(test)]
pub(crate) use client::test_support;
