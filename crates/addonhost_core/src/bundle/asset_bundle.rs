//! Named, ordered asset bundles and the bundle manifest.
//!
//! # Responsibility
//! - Merge extension asset contributions into named bundles.
//! - Expose effective load order and override priority per asset.
//!
//! # Invariants
//! - Entries are ordered by `(priority ASC, sequence ASC)`.
//! - Sequence numbers are unique within a bundle and never reused.
//! - An owner's entries follow that owner's declared order.
//! - One owner contributes a given path at most once per bundle.

use crate::extension::asset::{AssetKind, AssetRef};
use std::collections::{BTreeMap, BTreeSet};

/// One asset contribution placed in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// Extension that contributed this asset.
    pub owner: String,
    pub path: String,
    pub kind: AssetKind,
    /// Declared override priority, higher loads later.
    pub priority: i32,
    /// Bundle-local merge counter used as tie breaker.
    pub sequence: u64,
}

impl BundleEntry {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(self.path.as_str())
    }
}

/// Summary of one merge call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub kept: usize,
    pub dropped: usize,
    /// Kept entries that moved to follow a new declared order.
    pub reordered: usize,
}

/// Ordered asset list for one bundle name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    name: String,
    entries: Vec<BundleEntry>,
    next_sequence: u64,
}

impl AssetBundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Rebuilds a bundle from persisted entries.
    pub fn from_entries(name: impl Into<String>, entries: Vec<BundleEntry>) -> Self {
        let next_sequence = entries
            .iter()
            .map(|entry| entry.sequence + 1)
            .max()
            .unwrap_or(0);
        let mut bundle = Self {
            name: name.into(),
            entries,
            next_sequence,
        };
        bundle.sort_entries();
        bundle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Asset paths in effective load order.
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.path.as_str()).collect()
    }

    /// File names in effective load order.
    pub fn file_names(&self) -> Vec<&str> {
        self.entries.iter().map(BundleEntry::file_name).collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry.path == path)
    }

    /// Sorted ids of extensions that contribute to this bundle.
    pub fn owners(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|entry| entry.owner.as_str()).collect()
    }

    /// Effective load position of `path`; a larger rank wins the cascade.
    ///
    /// When several owners contribute the same path, the last one counts.
    pub fn rank_of(&self, path: &str) -> Option<usize> {
        self.entries.iter().rposition(|entry| entry.path == path)
    }

    /// Declared override priority of `path`.
    pub fn priority_of(&self, path: &str) -> Option<i32> {
        self.rank_of(path).map(|rank| self.entries[rank].priority)
    }

    /// Returns whether `winner` takes precedence over `other` in this bundle.
    pub fn overrides(&self, winner: &str, other: &str) -> Option<bool> {
        Some(self.rank_of(winner)? > self.rank_of(other)?)
    }

    /// Merges one owner's ordered contribution.
    ///
    /// Re-merging is idempotent: paths already present keep their sequence,
    /// new paths are appended in declared order, and paths the owner no
    /// longer declares are dropped. When the declared order of kept paths
    /// changes, the owner's existing sequence slots are handed out again in
    /// the new order. Other owners' entries keep their relative order.
    pub fn merge(&mut self, owner: &str, contribution: &[AssetRef]) -> MergeOutcome {
        let declared: BTreeMap<&str, &AssetRef> = contribution
            .iter()
            .map(|asset| (asset.path.as_str(), asset))
            .collect();

        let mut outcome = MergeOutcome::default();
        let mut present = BTreeSet::new();
        let mut slots = Vec::new();
        self.entries.retain_mut(|entry| {
            if entry.owner != owner {
                return true;
            }
            match declared.get(entry.path.as_str()) {
                Some(asset) => {
                    entry.priority = asset.priority;
                    entry.kind = asset.kind;
                    present.insert(entry.path.clone());
                    slots.push(entry.sequence);
                    outcome.kept += 1;
                    true
                }
                None => {
                    outcome.dropped += 1;
                    false
                }
            }
        });

        slots.sort_unstable();
        let mut slots = slots.into_iter();
        let mut resequenced: BTreeMap<&str, u64> = BTreeMap::new();
        for asset in contribution {
            let path = asset.path.as_str();
            if present.contains(path) && !resequenced.contains_key(path) {
                if let Some(sequence) = slots.next() {
                    resequenced.insert(path, sequence);
                }
            }
        }
        for entry in self.entries.iter_mut().filter(|entry| entry.owner == owner) {
            if let Some(sequence) = resequenced.get(entry.path.as_str()) {
                if entry.sequence != *sequence {
                    entry.sequence = *sequence;
                    outcome.reordered += 1;
                }
            }
        }

        for asset in contribution {
            if present.contains(&asset.path) {
                continue;
            }
            present.insert(asset.path.clone());
            self.entries.push(BundleEntry {
                owner: owner.to_string(),
                path: asset.path.clone(),
                kind: asset.kind,
                priority: asset.priority,
                sequence: self.next_sequence,
            });
            self.next_sequence += 1;
            outcome.added += 1;
        }

        self.sort_entries();
        outcome
    }

    /// Removes every entry contributed by `owner`; returns how many.
    pub fn remove_owner(&mut self, owner: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.owner != owner);
        before - self.entries.len()
    }

    fn sort_entries(&mut self) {
        self.entries
            .sort_by_key(|entry| (entry.priority, entry.sequence));
    }
}

/// All bundles known to the host, keyed by bundle name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleManifest {
    bundles: BTreeMap<String, AssetBundle>,
}

impl BundleManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundle(&self, name: &str) -> Option<&AssetBundle> {
        self.bundles.get(name)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &AssetBundle> {
        self.bundles.values()
    }

    pub fn bundle_names(&self) -> Vec<&str> {
        self.bundles.keys().map(String::as_str).collect()
    }

    /// Inserts a bundle restored from storage, replacing any same-named one.
    pub fn insert(&mut self, bundle: AssetBundle) {
        self.bundles.insert(bundle.name().to_string(), bundle);
    }

    /// Merges `contribution` into `bundle`, creating the bundle on demand.
    pub fn merge_assets(
        &mut self,
        bundle: &str,
        owner: &str,
        contribution: &[AssetRef],
    ) -> MergeOutcome {
        self.bundles
            .entry(bundle.to_string())
            .or_insert_with(|| AssetBundle::new(bundle))
            .merge(owner, contribution)
    }

    /// Applies an owner's full asset map; bundles the owner no longer
    /// targets lose that owner's entries.
    pub fn apply_owner(
        &mut self,
        owner: &str,
        assets: &BTreeMap<String, Vec<AssetRef>>,
    ) -> MergeOutcome {
        let mut total = MergeOutcome::default();
        let stale: Vec<String> = self
            .bundles
            .iter()
            .filter(|(name, bundle)| {
                !assets.contains_key(name.as_str()) && bundle.owners().contains(owner)
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            if let Some(bundle) = self.bundles.get_mut(&name) {
                total.dropped += bundle.remove_owner(owner);
            }
        }

        for (bundle, contribution) in assets {
            let outcome = self.merge_assets(bundle, owner, contribution);
            total.added += outcome.added;
            total.kept += outcome.kept;
            total.dropped += outcome.dropped;
            total.reordered += outcome.reordered;
        }
        self.bundles.retain(|_, bundle| !bundle.is_empty());
        total
    }

    /// Removes an owner's entries from every bundle; empty bundles vanish.
    pub fn remove_owner(&mut self, owner: &str) -> usize {
        let removed = self
            .bundles
            .values_mut()
            .map(|bundle| bundle.remove_owner(owner))
            .sum();
        self.bundles.retain(|_, bundle| !bundle.is_empty());
        removed
    }
}
