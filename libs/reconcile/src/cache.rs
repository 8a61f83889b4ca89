//! Container cache with ID-set diffing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dockwatch_id::ContainerId;
use parking_lot::RwLock;

use crate::ContainerRecord;

/// Result of comparing the cache against a candidate list.
///
/// Order within each list is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Candidates whose ID is not cached.
    pub to_add: Vec<Arc<ContainerRecord>>,
    /// Cached entries whose ID is not among the candidates.
    pub to_remove: Vec<Arc<ContainerRecord>>,
}

impl Diff {
    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Thread-safe mapping from container ID to the last known record.
///
/// Mutation and diffing take the write lock; lookups share the read lock.
#[derive(Debug, Default)]
pub struct ContainerCache {
    entries: RwLock<HashMap<ContainerId, Arc<ContainerRecord>>>,
}

impl ContainerCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its ID.
    pub fn add(&self, record: Arc<ContainerRecord>) {
        self.entries.write().insert(record.id.clone(), record);
    }

    /// Drop the record with this ID, if cached.
    pub fn remove(&self, id: &ContainerId) {
        self.entries.write().remove(id);
    }

    /// Replace the entire contents.
    pub fn reset<I>(&self, records: I)
    where
        I: IntoIterator<Item = Arc<ContainerRecord>>,
    {
        let fresh: HashMap<_, _> = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        *self.entries.write() = fresh;
    }

    /// Compare the cached ID set against `candidates`.
    pub fn diff(&self, candidates: &[Arc<ContainerRecord>]) -> Diff {
        let entries = self.entries.write();

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut to_add = Vec::new();
        for candidate in candidates {
            if !seen.insert(&candidate.id) {
                continue;
            }
            if !entries.contains_key(&candidate.id) {
                to_add.push(Arc::clone(candidate));
            }
        }

        let to_remove = entries
            .iter()
            .filter(|(id, _)| !seen.contains(id))
            .map(|(_, record)| Arc::clone(record))
            .collect();

        Diff { to_add, to_remove }
    }

    /// Look up a record by ID.
    pub fn get(&self, id: &ContainerId) -> Option<Arc<ContainerRecord>> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ContainerId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All cached records, sorted by ID.
    pub fn snapshot(&self) -> Vec<Arc<ContainerRecord>> {
        let mut records: Vec<_> = self.entries.read().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// All cached IDs, sorted.
    pub fn ids(&self) -> Vec<ContainerId> {
        let mut ids: Vec<_> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

// =============================================================================
// Tests
// =============================================================================
