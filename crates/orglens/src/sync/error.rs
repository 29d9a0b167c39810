//! Sync error types.

use thiserror::Error;

use crate::github::GitHubError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A fetch stopped early. What was gathered has been persisted.
    #[error("{resource} incomplete: {source}")]
    Incomplete {
        resource: String,
        #[source]
        source: GitHubError,
    },

    #[error("no sync checkpoint found and no initial start date configured")]
    NoStartDate,
}

impl SyncError {
    pub(crate) fn incomplete(resource: impl Into<String>, source: GitHubError) -> Self {
        Self::Incomplete {
            resource: resource.into(),
            source,
        }
    }
}
