//! Offline reports computed from the local mirror.

use orglens::{CollectionStore, IdentityConfig, community_developers};

use crate::commands::shared::{CommonSyncOptions, store};
use crate::config::Config;

/// Print the community developers of one repository.
pub(crate) async fn handle_community(
    config: &Config,
    opts: CommonSyncOptions,
    repo: &str,
    json: bool,
) -> anyhow::Result<()> {
    let names = community_names(config, &store(config, &opts), repo).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in &names {
            println!("{name}");
        }
        eprintln!("{} community developer(s) in {repo}", names.len());
    }
    Ok(())
}

async fn community_names(
    config: &Config,
    store: &CollectionStore,
    repo: &str,
) -> anyhow::Result<Vec<String>> {
    let commits = store.load_commits(repo).await?;
    if commits.is_empty() {
        tracing::warn!("No stored commits for {}; run `orglens sync` first", repo);
    }

    let identity = IdentityConfig {
        internal_markers: config.identity.internal_markers.clone(),
    };
    Ok(community_developers(&commits, &identity))
}

/// Recompute module weights from the stored commits and print them.
pub(crate) async fn handle_weights(config: &Config, opts: CommonSyncOptions) -> anyhow::Result<()> {
    let weights = orglens::weights::rebuild(&store(config, &opts)).await?;
    tracing::info!("Module weights updated for {} repositories", weights.len());

    println!("{}", serde_json::to_string_pretty(&weights)?);
    Ok(())
}
