//! The persisted graph record of a novel project.

use super::{Snapshot, SnapshotStore, StoreError};
use crate::audit::AuditState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current graph data format version.
pub const GRAPH_DATA_VERSION: u32 = 1;

fn default_version() -> u32 {
    GRAPH_DATA_VERSION
}

/// Everything the engine keeps about one project's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    /// Format version for compatibility checking.
    #[serde(default = "default_version")]
    pub version: u32,

    /// When the snapshots were last built or extended.
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub snapshots: SnapshotStore,

    #[serde(default)]
    pub audit: AuditState,

    /// Set once the baseline (chapter 0) exists.
    #[serde(default)]
    pub graph_generated: bool,
}

impl Default for GraphData {
    fn default() -> Self {
        Self {
            version: GRAPH_DATA_VERSION,
            generated_at: None,
            snapshots: SnapshotStore::new(),
            audit: AuditState::default(),
            graph_generated: false,
        }
    }
}

impl GraphData {
    /// Create an empty, not-yet-generated record.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh record whose only snapshot is `baseline` at chapter 0.
    pub fn from_baseline(baseline: Snapshot) -> Self {
        let mut snapshots = SnapshotStore::new();
        // Empty store: inserting chapter 0 cannot collide
        let _ = snapshots.insert(0, baseline);
        Self {
            generated_at: Some(Utc::now()),
            snapshots,
            graph_generated: true,
            ..Self::default()
        }
    }

    /// The chapter 0 snapshot, if built.
    pub fn baseline(&self) -> Option<&Snapshot> {
        self.snapshots.get(0)
    }

    pub fn has_baseline(&self) -> bool {
        self.snapshots.contains(0)
    }

    /// The graph as of `chapter` (see [`SnapshotStore::nearest_at_or_before`]).
    pub fn snapshot_for_chapter(&self, chapter: i64) -> Option<&Snapshot> {
        self.snapshots.nearest_at_or_before(chapter)
    }

    /// Store the snapshot for a chapter that has none yet.
    pub fn store_snapshot(&mut self, chapter: u32, snapshot: Snapshot) -> Result<(), StoreError> {
        self.snapshots.insert(chapter, snapshot)
    }

    /// Record that the snapshots changed now.
    pub fn touch(&mut self) {
        self.generated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn test_from_baseline() {
        let data = GraphData::from_baseline(Snapshot::from_parts(
            vec![Node::character("a", "Ann")],
            Vec::new(),
        ));

        assert!(data.graph_generated);
        assert!(data.has_baseline());
        assert!(data.generated_at.is_some());
        assert_eq!(data.snapshot_for_chapter(42).unwrap().node_count(), 1);
    }

    #[test]
    fn test_wire_shape() {
        let data = GraphData::from_baseline(Snapshot::new());
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["version"], 1);
        assert_eq!(json["graphGenerated"], true);
        assert!(json["snapshots"]["0"]["nodes"].is_array());
        assert!(json["audit"]["inconsistencies"].is_array());
        assert!(json["audit"]["lastAuditAt"].is_null());
    }

    #[test]
    fn test_reads_fresh_project_record() {
        let raw = r#"{
            "version": 1,
            "generatedAt": null,
            "snapshots": {},
            "audit": { "inconsistencies": [], "lastAuditAt": null },
            "graphGenerated": false
        }"#;
        let data: GraphData = serde_json::from_str(raw).unwrap();
        assert_eq!(data, GraphData::new());
    }

    #[test]
    fn test_reads_javascript_timestamps() {
        let raw = r#"{"generatedAt":"2025-03-01T08:30:00.000Z","snapshots":{"0":{"nodes":[],"edges":[]}},"graphGenerated":true}"#;
        let data: GraphData = serde_json::from_str(raw).unwrap();
        assert!(data.generated_at.is_some());
        assert!(data.has_baseline());
    }
}
