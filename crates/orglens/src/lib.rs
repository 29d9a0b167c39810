//! Orglens - an incremental mirror of a GitHub organization.
//!
//! This library keeps a local JSON copy of an organization's repositories,
//! issues, pull requests, and default-branch commits, refreshed in
//! fixed-length windows. On top of the mirror it resolves commit authors
//! into developer identities and derives per-module importance weights.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use orglens::{CollectionStore, GitHubClient, KeywordLabeler, SyncEngine, SyncOptions};
//!
//! let client = GitHubClient::new(&token)?;
//! let store = CollectionStore::new("data");
//! let options = SyncOptions { orgs: vec!["PaddlePaddle".into()], ..Default::default() };
//!
//! let engine = SyncEngine::new(client, store, Arc::new(KeywordLabeler::default()), options);
//! let summary = engine.run(chrono::Utc::now().date_naive()).await?;
//! ```

pub mod checkpoint;
pub mod enrich;
pub mod github;
pub mod http;
pub mod identity;
pub mod labeling;
pub mod model;
pub mod retry;
pub mod store;
pub mod sync;
pub mod weights;

pub use checkpoint::{SyncCheckpoint, SyncWindow, plan_windows};
pub use enrich::DetailSource;
pub use github::{GitHubClient, GitHubError};
pub use identity::{DeveloperCluster, IdentityConfig, cluster_developers, community_developers};
pub use labeling::{KeywordLabeler, LabelError, Labeler};
pub use model::{
    Activity, CommitRecord, FileChange, IssueRecord, PullRequestRecord, RepositoryRecord,
    TrackedItem,
};
pub use store::{CollectionStore, StoreError};
pub use sync::{RunSummary, SyncEngine, SyncError, SyncOptions, SyncProgress, SyncResult};
pub use weights::ModuleWeights;
