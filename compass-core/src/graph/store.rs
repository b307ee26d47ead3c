//! Sparse, chapter-indexed snapshot storage.

use super::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from snapshot store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("chapter {0} already has a snapshot")]
    Occupied(u32),
}

/// Snapshots keyed by chapter number.
///
/// Not every chapter has an entry. Entries are write-once: once a chapter is
/// stored it is never replaced. On the wire this is a JSON object whose keys
/// are chapter numbers as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotStore {
    snapshots: BTreeMap<u32, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot for a chapter that has none yet.
    pub fn insert(&mut self, chapter: u32, snapshot: Snapshot) -> Result<(), StoreError> {
        if self.snapshots.contains_key(&chapter) {
            return Err(StoreError::Occupied(chapter));
        }
        self.snapshots.insert(chapter, snapshot);
        Ok(())
    }

    /// Exact lookup.
    pub fn get(&self, chapter: u32) -> Option<&Snapshot> {
        self.snapshots.get(&chapter)
    }

    pub fn contains(&self, chapter: u32) -> bool {
        self.snapshots.contains_key(&chapter)
    }

    /// The snapshot with the greatest chapter key not above `chapter`.
    ///
    /// Returns `None` when the store is empty or every key is above `chapter`.
    pub fn nearest_at_or_before(&self, chapter: i64) -> Option<&Snapshot> {
        self.nearest_entry(chapter).map(|(_, snapshot)| snapshot)
    }

    /// Like [`nearest_at_or_before`](Self::nearest_at_or_before), also returning the key.
    pub fn nearest_entry(&self, chapter: i64) -> Option<(u32, &Snapshot)> {
        if chapter < 0 {
            return None;
        }
        let bound = u32::try_from(chapter).unwrap_or(u32::MAX);
        self.snapshots
            .range(..=bound)
            .next_back()
            .map(|(key, snapshot)| (*key, snapshot))
    }

    /// The most recent snapshot, i.e. the graph as of the end of the book so far.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.values().next_back()
    }

    /// Stored chapter numbers, ascending.
    pub fn chapters(&self) -> Vec<u32> {
        self.snapshots.keys().copied().collect()
    }

    /// Iterate `(chapter, snapshot)` pairs in ascending chapter order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Snapshot)> {
        self.snapshots.iter().map(|(k, s)| (*k, s))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn tagged(label: &str) -> Snapshot {
        Snapshot::from_parts(vec![Node::character(label, label)], Vec::new())
    }

    fn store() -> SnapshotStore {
        let mut store = SnapshotStore::new();
        store.insert(0, tagged("zero")).unwrap();
        store.insert(5, tagged("five")).unwrap();
        store.insert(10, tagged("ten")).unwrap();
        store
    }

    #[test]
    fn test_nearest_at_or_before() {
        let store = store();

        assert_eq!(store.nearest_at_or_before(3), Some(&tagged("zero")));
        assert_eq!(store.nearest_at_or_before(5), Some(&tagged("five")));
        assert_eq!(store.nearest_at_or_before(9), Some(&tagged("five")));
        assert_eq!(store.nearest_at_or_before(10), Some(&tagged("ten")));
        assert_eq!(store.nearest_at_or_before(i64::MAX), Some(&tagged("ten")));
        assert_eq!(store.nearest_at_or_before(-1), None);
    }

    #[test]
    fn test_nearest_below_every_key() {
        let mut store = SnapshotStore::new();
        store.insert(4, tagged("four")).unwrap();
        assert_eq!(store.nearest_at_or_before(3), None);
        assert_eq!(store.nearest_entry(7).map(|(k, _)| k), Some(4));
    }

    #[test]
    fn test_empty_store() {
        let store = SnapshotStore::new();
        assert!(store.is_empty());
        assert_eq!(store.nearest_at_or_before(0), None);
        assert_eq!(store.nearest_at_or_before(100), None);
        assert_eq!(store.latest(), None);
    }

    #[test]
    fn test_insert_never_overwrites() {
        let mut store = store();
        let err = store.insert(5, tagged("replacement")).unwrap_err();

        assert_eq!(err, StoreError::Occupied(5));
        assert_eq!(store.get(5), Some(&tagged("five")));
    }

    #[test]
    fn test_chapters_and_latest() {
        let store = store();
        assert_eq!(store.chapters(), vec![0, 5, 10]);
        assert_eq!(store.latest(), Some(&tagged("ten")));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_wire_keys_are_strings() {
        let json = serde_json::to_value(store()).unwrap();
        assert!(json.get("0").is_some());
        assert!(json.get("10").is_some());

        let back: SnapshotStore = serde_json::from_str(&json.to_string()).unwrap();
        assert_eq!(back, store());
    }
}
