//! Developer identity clustering.
//!
//! Commit author `(name, email)` pairs are folded into clusters that stand
//! for one human each:
//!
//! 1. Exact grouping by normalized email, in commit order.
//! 2. A single forward sweep where each surviving group absorbs every other
//!    surviving group sharing one of its multi-word names. Single-token
//!    names (`alice`, `admin`) never bridge.
//! 3. Groups sharing an email are joined transitively (union-find).
//!
//! A cluster with any email containing an internal marker is internal; the
//! names of every other cluster are community developers.

use std::collections::{BTreeSet, HashMap};

use crate::model::CommitRecord;

/// Email substrings marking organization-internal developers.
pub const DEFAULT_INTERNAL_MARKERS: &[&str] = &["baidu.com", "paddle"];

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub internal_markers: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            internal_markers: DEFAULT_INTERNAL_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// One developer: every normalized name and email seen for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeveloperCluster {
    pub names: BTreeSet<String>,
    pub emails: BTreeSet<String>,
    /// Number of commits attributed to the cluster.
    pub commits: u64,
}

impl DeveloperCluster {
    fn absorb(&mut self, other: DeveloperCluster) {
        self.names.extend(other.names);
        self.emails.extend(other.emails);
        self.commits += other.commits;
    }

    /// Whether any email contains one of `markers`.
    pub fn is_internal(&self, markers: &[String]) -> bool {
        self.emails
            .iter()
            .any(|email| markers.iter().any(|m| email.contains(m.as_str())))
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn is_multi_word(name: &str) -> bool {
    name.split_whitespace().nth(1).is_some()
}

/// Step 1: group commits by exact normalized email.
///
/// Commits without an author name or email are skipped. A value that is
/// empty once trimmed counts as missing, so whitespace-only names never
/// add a blank name or an extra commit to a cluster.
pub fn group_by_email(commits: &[CommitRecord]) -> Vec<DeveloperCluster> {
    let mut by_email: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DeveloperCluster> = Vec::new();

    for commit in commits {
        let (Some(name), Some(email)) = (&commit.author_name, &commit.author_email) else {
            continue;
        };
        let (name, email) = (normalize(name), normalize(email));
        if name.is_empty() || email.is_empty() {
            continue;
        }

        let index = *by_email.entry(email.clone()).or_insert_with(|| {
            groups.push(DeveloperCluster::default());
            groups.len() - 1
        });
        let group = &mut groups[index];
        group.names.insert(name);
        group.emails.insert(email);
        group.commits += 1;
    }

    groups
}

/// Step 2: one forward sweep of multi-word name bridging.
///
/// Bridges are computed from each group's names at the moment it is
/// visited, so a name picked up by absorption does not bridge again within
/// the same sweep.
pub fn bridge_by_name(groups: Vec<DeveloperCluster>) -> Vec<DeveloperCluster> {
    let mut by_name: HashMap<String, BTreeSet<usize>> = HashMap::new();
    for (i, group) in groups.iter().enumerate() {
        for name in group.names.iter().filter(|n| is_multi_word(n)) {
            by_name.entry(name.clone()).or_default().insert(i);
        }
    }

    let mut slots: Vec<Option<DeveloperCluster>> = groups.into_iter().map(Some).collect();

    for i in 0..slots.len() {
        let Some(names) = slots[i].as_ref().map(|g| g.names.clone()) else {
            continue;
        };

        let partners: BTreeSet<usize> = names
            .iter()
            .filter(|n| is_multi_word(n))
            .filter_map(|n| by_name.get(n))
            .flatten()
            .copied()
            .filter(|&j| j != i)
            .collect();

        for j in partners {
            if let Some(other) = slots[j].take()
                && let Some(group) = slots[i].as_mut()
            {
                group.absorb(other);
            }
        }
    }

    slots.into_iter().flatten().collect()
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // The lower index stays root.
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Step 3: join groups that share any email, transitively.
///
/// Output is ordered by each component's earliest group.
pub fn converge_by_email(groups: Vec<DeveloperCluster>) -> Vec<DeveloperCluster> {
    let mut sets = UnionFind::new(groups.len());
    let mut first_owner: HashMap<&str, usize> = HashMap::new();

    for (i, group) in groups.iter().enumerate() {
        for email in &group.emails {
            match first_owner.get(email.as_str()) {
                Some(&j) => sets.union(i, j),
                None => {
                    first_owner.insert(email.as_str(), i);
                }
            }
        }
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut clusters: Vec<DeveloperCluster> = Vec::new();
    for (i, group) in groups.into_iter().enumerate() {
        let root = sets.find(i);
        match slot_of_root.get(&root) {
            Some(&slot) => clusters[slot].absorb(group),
            None => {
                slot_of_root.insert(root, clusters.len());
                clusters.push(group);
            }
        }
    }
    clusters
}

/// Run all three steps.
pub fn cluster_developers(commits: &[CommitRecord]) -> Vec<DeveloperCluster> {
    converge_by_email(bridge_by_name(group_by_email(commits)))
}

/// Names of every developer outside the organization.
pub fn community_developers(commits: &[CommitRecord], config: &IdentityConfig) -> Vec<String> {
    let clusters = cluster_developers(commits);
    tracing::debug!(
        "{} commits resolved to {} developer clusters",
        commits.len(),
        clusters.len()
    );

    clusters
        .into_iter()
        .filter(|c| !c.is_internal(&config.internal_markers))
        .flat_map(|c| c.names)
        .collect()
}
