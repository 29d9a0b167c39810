//! Module-importance weights from commit file lists.
//!
//! A module is the first two path segments of a file (`python/paddle` for
//! `python/paddle/nn/layer.py`), or the first segment for shallower paths.
//! The weight of a module is `ln(touches + 1)` normalized by the repository's
//! largest such value, so the most-touched module weighs exactly 1.0.

use std::collections::BTreeMap;

use crate::model::CommitRecord;
use crate::store::{CollectionStore, StoreError};

/// Repository full name to module id to weight.
pub type ModuleWeights = BTreeMap<String, BTreeMap<String, f64>>;

/// Module id of a file path.
pub fn module_of(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() > 2 {
        parts[..2].join("/")
    } else {
        parts[0].to_string()
    }
}

/// Count file touches per module. Commits without a file list count nothing.
pub fn module_counts(commits: &[CommitRecord]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for file in commits.iter().filter_map(|c| c.files.as_ref()).flatten() {
        *counts.entry(module_of(&file.filename)).or_insert(0) += 1;
    }
    counts
}

/// Log-scale and max-normalize touch counts.
pub fn normalize(counts: &BTreeMap<String, u64>) -> BTreeMap<String, f64> {
    let logs: BTreeMap<&String, f64> = counts
        .iter()
        .map(|(module, &count)| (module, (count as f64 + 1.0).ln()))
        .collect();
    let max = logs.values().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return BTreeMap::new();
    }

    logs.into_iter()
        .map(|(module, log)| (module.clone(), log / max))
        .collect()
}

/// Weights of one repository's modules.
pub fn repository_weights(commits: &[CommitRecord]) -> BTreeMap<String, f64> {
    normalize(&module_counts(commits))
}

/// Recompute weights for every stored repository and save them.
pub async fn rebuild(store: &CollectionStore) -> Result<ModuleWeights, StoreError> {
    let mut weights = ModuleWeights::new();
    for repo in store.load_repositories().await? {
        let commits = store.load_commits(&repo.full_name).await?;
        weights.insert(repo.full_name, repository_weights(&commits));
    }

    store.save_weights(&weights).await?;
    Ok(weights)
}
