//! Incremental merge store.
//!
//! Each collection is one JSON array file under the data directory:
//!
//! ```text
//! <root>/repos.json
//! <root>/issues/<owner>_<name>_issues.json
//! <root>/prs/<owner>_<name>_prs.json
//! <root>/commits/<owner>_<name>_commits.json
//! <root>/module_weights.json
//! <root>/data_update_time.json
//! ```
//!
//! Files are rewritten whole through a sibling temp file and a rename. A
//! missing file loads as an empty collection.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::model::{CommitRecord, IssueRecord, PullRequestRecord, RepositoryRecord};
use crate::weights::ModuleWeights;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A record with a unique key within its collection.
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

/// A record carrying an externally assigned label that survives re-fetches.
pub trait Categorized {
    fn category(&self) -> Option<&str>;

    fn set_category(&mut self, category: Option<String>);
}

impl Keyed for IssueRecord {
    type Key = u64;

    fn key(&self) -> u64 {
        self.number
    }
}

impl Keyed for PullRequestRecord {
    type Key = u64;

    fn key(&self) -> u64 {
        self.number
    }
}

impl Keyed for RepositoryRecord {
    type Key = String;

    fn key(&self) -> String {
        self.full_name.clone()
    }
}

impl Keyed for CommitRecord {
    type Key = String;

    fn key(&self) -> String {
        self.sha.clone()
    }
}

impl Categorized for IssueRecord {
    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn set_category(&mut self, category: Option<String>) {
        self.category = category;
    }
}

impl Categorized for PullRequestRecord {
    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn set_category(&mut self, category: Option<String>) {
        self.category = category;
    }
}

impl Categorized for RepositoryRecord {
    fn category(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    fn set_category(&mut self, category: Option<String>) {
        self.domain = category;
    }
}

/// Counts produced by a merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// Merge `incoming` into `existing` by key.
///
/// Existing order is preserved. An update replaces every field except the
/// category, which is carried over when the incoming record has none. New
/// keys are appended in arrival order.
pub fn merge_items<T>(existing: &mut Vec<T>, incoming: Vec<T>) -> MergeOutcome
where
    T: Keyed + Categorized,
{
    let mut index: HashMap<T::Key, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, record)| (record.key(), i))
        .collect();
    let mut outcome = MergeOutcome::default();

    for mut record in incoming {
        match index.get(&record.key()) {
            Some(&i) => {
                if record.category().is_none() {
                    record.set_category(existing[i].category().map(str::to_string));
                }
                existing[i] = record;
                outcome.updated += 1;
            }
            None => {
                index.insert(record.key(), existing.len());
                existing.push(record);
                outcome.inserted += 1;
            }
        }
    }

    outcome
}

/// Merge repositories by full name. Repositories missing from `incoming`
/// are kept; the domain tag is carried forward.
pub fn merge_repositories(
    existing: &mut Vec<RepositoryRecord>,
    incoming: Vec<RepositoryRecord>,
) -> MergeOutcome {
    merge_items(existing, incoming)
}

/// Append commits whose SHA is not stored yet. Stored commits never change.
pub fn merge_commits(existing: &mut Vec<CommitRecord>, incoming: Vec<CommitRecord>) -> MergeOutcome {
    let mut seen: HashSet<String> = existing.iter().map(|c| c.sha.clone()).collect();
    let mut outcome = MergeOutcome::default();

    for commit in incoming {
        if seen.insert(commit.sha.clone()) {
            existing.push(commit);
            outcome.inserted += 1;
        }
    }

    outcome
}

/// Split `incoming` into records already stored (updates) and new ones.
pub fn split_new<T: Keyed>(existing: &[T], incoming: Vec<T>) -> (Vec<T>, Vec<T>) {
    let known: HashSet<T::Key> = existing.iter().map(Keyed::key).collect();
    incoming
        .into_iter()
        .partition(|record| known.contains(&record.key()))
}

/// File-backed collections rooted at a data directory.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    root: PathBuf,
}

impl CollectionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repositories_path(&self) -> PathBuf {
        self.root.join("repos.json")
    }

    pub fn issues_path(&self, repo: &str) -> PathBuf {
        self.per_repo("issues", repo)
    }

    pub fn pull_requests_path(&self, repo: &str) -> PathBuf {
        self.per_repo("prs", repo)
    }

    pub fn commits_path(&self, repo: &str) -> PathBuf {
        self.per_repo("commits", repo)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.root.join("module_weights.json")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join("data_update_time.json")
    }

    fn per_repo(&self, kind: &str, repo: &str) -> PathBuf {
        self.root
            .join(kind)
            .join(format!("{}_{}.json", repo.replace('/', "_"), kind))
    }

    pub async fn load_repositories(&self) -> Result<Vec<RepositoryRecord>, StoreError> {
        Ok(read_json(&self.repositories_path()).await?.unwrap_or_default())
    }

    pub async fn save_repositories(&self, repos: &[RepositoryRecord]) -> Result<(), StoreError> {
        write_json(&self.repositories_path(), repos).await
    }

    pub async fn load_issues(&self, repo: &str) -> Result<Vec<IssueRecord>, StoreError> {
        Ok(read_json(&self.issues_path(repo)).await?.unwrap_or_default())
    }

    pub async fn save_issues(&self, repo: &str, issues: &[IssueRecord]) -> Result<(), StoreError> {
        write_json(&self.issues_path(repo), issues).await
    }

    pub async fn load_pull_requests(&self, repo: &str) -> Result<Vec<PullRequestRecord>, StoreError> {
        Ok(read_json(&self.pull_requests_path(repo)).await?.unwrap_or_default())
    }

    pub async fn save_pull_requests(
        &self,
        repo: &str,
        prs: &[PullRequestRecord],
    ) -> Result<(), StoreError> {
        write_json(&self.pull_requests_path(repo), prs).await
    }

    pub async fn load_commits(&self, repo: &str) -> Result<Vec<CommitRecord>, StoreError> {
        Ok(read_json(&self.commits_path(repo)).await?.unwrap_or_default())
    }

    pub async fn save_commits(&self, repo: &str, commits: &[CommitRecord]) -> Result<(), StoreError> {
        write_json(&self.commits_path(repo), commits).await
    }

    pub async fn load_weights(&self) -> Result<ModuleWeights, StoreError> {
        Ok(read_json(&self.weights_path()).await?.unwrap_or_default())
    }

    pub async fn save_weights(&self, weights: &ModuleWeights) -> Result<(), StoreError> {
        write_json(&self.weights_path(), weights).await
    }
}

/// Read a JSON file; `None` when it does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("{} does not exist yet", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `value` as 4-space indented JSON, atomically replacing `path`.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut content = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&temp_path, &content).await.map_err(io_err)?;
    tokio::fs::rename(&temp_path, path).await.map_err(io_err)?;

    tracing::debug!("wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}
