//! Mirror refresh commands: the windowed run, a repository-only refresh, and
//! onboarding of a single repository.

use chrono::{NaiveDate, Utc};

use orglens::sync::{RunSummary, SyncResult};

use crate::commands::shared::{CommonSyncOptions, build_engine, store, sync_options};
use crate::config::Config;

/// Walk every window from the checkpoint up to `until` (default today).
pub(crate) async fn handle_sync(
    config: &Config,
    opts: CommonSyncOptions,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let options = sync_options(config, &opts, since);
    if options.orgs.is_empty() {
        anyhow::bail!("no organizations configured; pass --org or set [sync] orgs");
    }

    let until = until.unwrap_or_else(|| Utc::now().date_naive());
    let engine = build_engine(config, options, store(config, &opts))?;
    let summary = engine.run(until).await?;

    print_run_summary(&summary);
    if summary.windows_failed > 0 {
        anyhow::bail!("{} sync window(s) failed", summary.windows_failed);
    }
    Ok(())
}

/// Refresh the repository collection only.
pub(crate) async fn handle_repos(
    config: &Config,
    opts: CommonSyncOptions,
    until: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let options = sync_options(config, &opts, None);
    if options.orgs.is_empty() {
        anyhow::bail!("no organizations configured; pass --org or set [sync] orgs");
    }

    let engine = build_engine(config, options, store(config, &opts))?;
    let result = engine.sync_repositories(until).await?;
    print_result("repositories", &result);
    Ok(())
}

/// Fetch the full issue / pull request history of one repository.
pub(crate) async fn handle_onboard(
    config: &Config,
    opts: CommonSyncOptions,
    repo: &str,
) -> anyhow::Result<()> {
    orglens::github::split_full_name(repo)?;

    let engine = build_engine(config, sync_options(config, &opts, None), store(config, &opts))?;
    let result = engine.onboard_items(repo).await?;
    print_result(repo, &result);
    Ok(())
}

fn print_result(scope: &str, result: &SyncResult) {
    println!(
        "{scope}: {} fetched, {} new, {} updated, {} failed",
        result.fetched, result.inserted, result.updated, result.failed
    );
    for error in &result.errors {
        eprintln!("  {error}");
    }
}

fn print_run_summary(summary: &RunSummary) {
    println!(
        "{} window(s) completed, {} failed",
        summary.windows_completed, summary.windows_failed
    );
    if let Some(checkpoint) = summary.checkpoint {
        println!("Synced through {checkpoint}");
    }
    print_result("records", &summary.result);
}
