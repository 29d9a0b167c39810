//! Windowed incremental sync of an organization mirror.
//!
//! # Module Structure
//!
//! - [`types`] - Core types: `SyncResult`, `SyncOptions`, `RunSummary`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - The sync engine: repositories, items, commits, weights, windows
//!
//! # Example
//!
//! ```ignore
//! use orglens::sync::{SyncEngine, SyncOptions, SyncProgress};
//!
//! let engine = SyncEngine::new(client, store, labeler, SyncOptions::default())
//!     .with_progress(Box::new(|event| {
//!         if let SyncProgress::WindowFailed { error, .. } = event {
//!             eprintln!("window failed: {error}");
//!         }
//!     }));
//! let result = engine.sync_items("PaddlePaddle/Paddle", since, until).await?;
//! println!("{} new records", result.inserted);
//! ```

pub mod engine;
mod error;
mod progress;
mod types;

// Re-export types
pub use types::{RunSummary, SyncOptions, SyncResult};

// Re-export constants
pub use types::{
    DEFAULT_ENRICH_WORKERS, DEFAULT_WINDOW_DAYS, INITIAL_BACKOFF_MS, ITEM_CHANNEL_CAPACITY,
    MAX_BACKOFF_MS, MAX_SERVER_RETRIES, NETWORK_RETRY_DELAY_MS, RATE_LIMIT_MARGIN_SECS,
    WINDOW_FAILURE_COOLDOWN_SECS,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

pub use engine::SyncEngine;
pub use error::SyncError;
