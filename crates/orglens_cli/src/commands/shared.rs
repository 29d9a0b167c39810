use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use orglens::{
    CollectionStore, GitHubClient, IdentityConfig, KeywordLabeler, SyncEngine, SyncOptions,
};

use crate::config::Config;
use crate::progress::LoggingReporter;

/// Sync options that every network-backed command accepts.
#[derive(Debug, Clone, Default, clap::Args)]
pub(crate) struct CommonSyncOptions {
    /// Organization(s) to mirror (default from config)
    #[arg(short = 'o', long = "org")]
    pub(crate) orgs: Vec<String>,

    /// Maximum concurrent enrichment tasks (default from config or 9)
    #[arg(short = 'w', long)]
    pub(crate) workers: Option<usize>,

    /// Data directory for collections and the checkpoint (default from config)
    #[arg(short = 'd', long)]
    pub(crate) data_dir: Option<std::path::PathBuf>,
}

/// Resolve the sync options from config, with CLI flags taking precedence.
pub(crate) fn sync_options(
    config: &Config,
    opts: &CommonSyncOptions,
    initial_since: Option<NaiveDate>,
) -> SyncOptions {
    let orgs = if opts.orgs.is_empty() {
        config.sync.orgs.clone()
    } else {
        opts.orgs.clone()
    };

    SyncOptions {
        orgs,
        workers: opts.workers.unwrap_or(config.sync.workers).max(1),
        window_days: config.sync.window_days.max(1),
        initial_since: initial_since.or(config.sync.initial_since),
        ..SyncOptions::default()
    }
}

/// Store rooted at the configured (or overridden) data directory.
pub(crate) fn store(config: &Config, opts: &CommonSyncOptions) -> CollectionStore {
    let root = opts.data_dir.clone().unwrap_or_else(|| config.data_dir());
    tracing::debug!("Using data directory {}", root.display());
    CollectionStore::new(root)
}

/// Build a sync engine wired to the GitHub API and the logging reporter.
pub(crate) fn build_engine(
    config: &Config,
    options: SyncOptions,
    store: CollectionStore,
) -> anyhow::Result<SyncEngine> {
    let token = config.github_token().context(
        "no GitHub token configured; set ORGLENS_GITHUB_TOKEN or [github] token in orglens.toml",
    )?;

    let reporter = LoggingReporter::new();
    let client = GitHubClient::new(&token)
        .context("failed to create GitHub client")?
        .with_endpoints(&config.github.graphql_url, &config.github.rest_url)
        .with_progress(reporter.as_callback());

    let identity = IdentityConfig {
        internal_markers: config.identity.internal_markers.clone(),
    };

    Ok(
        SyncEngine::new(client, store, Arc::new(KeywordLabeler::default()), options)
            .with_identity(identity)
            .with_progress(reporter.as_callback()),
    )
}
